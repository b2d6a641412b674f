//! Deterministic address derivation for every account the console touches.

use solana_sdk::pubkey::Pubkey;

use crate::constants::{SEED_BET, SEED_PERMISSION, SEED_POOL, SEED_POOL_VAULT, SEED_PROTOCOL};

pub fn protocol() -> (Pubkey, u8) {
    Pubkey::find_program_address(&[SEED_PROTOCOL], &crate::ID)
}

pub fn pool(admin: &Pubkey, pool_id: u64) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[SEED_POOL, admin.as_ref(), &pool_id.to_le_bytes()],
        &crate::ID,
    )
}

pub fn pool_vault(pool: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[SEED_POOL_VAULT, pool.as_ref()], &crate::ID)
}

pub fn user_bet(pool: &Pubkey, user: &Pubkey, request_id: &str) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[SEED_BET, pool.as_ref(), user.as_ref(), request_id.as_bytes()],
        &crate::ID,
    )
}

/// Permission record owned by the MagicBlock permission program.
pub fn permission(account: &Pubkey, permission_program: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[SEED_PERMISSION, account.as_ref()], permission_program)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivations_are_stable_and_distinct() {
        let admin = Pubkey::new_unique();
        let user = Pubkey::new_unique();

        let (p1, _) = pool(&admin, 0);
        let (p2, _) = pool(&admin, 1);
        assert_ne!(p1, p2);
        assert_eq!(pool(&admin, 0).0, p1);

        let (b1, _) = user_bet(&p1, &user, "bet_1700000000000");
        let (b2, _) = user_bet(&p1, &user, "bet_1700000000001");
        assert_ne!(b1, b2);

        assert_ne!(protocol().0, pool_vault(&p1).0);
    }
}
