//! Deterministic contract address derivation for Universal Deployer deployments.

use starknet::core::{crypto::pedersen_hash, types::Felt, utils::get_contract_address};

/// Address of the Universal Deployer Contract.
pub const UDC_ADDRESS: Felt =
    Felt::from_hex_unchecked("0x041a78e741e5af2fec34b695679bc6891742439f7afb8484ecd7766661ad02bf");

/// Compute the address the Universal Deployer assigns to a deployment.
///
/// With `unique` set the salt is bound to the deployer (`pedersen(salt, deployer)`) and
/// the UDC is the effective deployer. Otherwise the salt is used as-is and the
/// deployer is zero, so anybody deploying the same class with the same salt and
/// calldata lands on the same address.
pub fn compute_udc_address(
    deployer: Felt,
    class_hash: Felt,
    salt: Felt,
    unique: bool,
    constructor_calldata: &[Felt],
) -> Felt {
    let (salt, deployer) = if unique {
        (pedersen_hash(&salt, &deployer), UDC_ADDRESS)
    } else {
        (salt, Felt::ZERO)
    };
    get_contract_address(salt, class_hash, constructor_calldata, deployer)
}
