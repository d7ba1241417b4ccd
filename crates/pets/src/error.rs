use crate::config::ConfigError;
use petkeeper_common::{LayoutError, OwnerIdentity, PetSpecies};
use petkeeper_compat::{CompatError, TypeTable};
use petkeeper_kernel::HostError;
use petkeeper_persist::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum PetError {
    #[error("host type table {table} is incompatible: {reason}")]
    RegistryIncompatible { table: TypeTable, reason: String },
    #[error("{0} already has an active pet")]
    OwnerAlreadyHasPet(OwnerIdentity),
    #[error("{0} has no active pet")]
    NoActivePet(OwnerIdentity),
    #[error("{0} is not online")]
    OwnerOffline(OwnerIdentity),
    #[error("{0} does not spawn as a pet class")]
    SpeciesNotRegistered(PetSpecies),
    #[error("pets are disabled: {0}")]
    PetsDisabled(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Compat(#[from] CompatError),
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
