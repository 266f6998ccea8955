//! Checks run before a request leaves the client.

use zkaa_common::{Address, ZkaaError, LAMPORTS_PER_UNIT};

/// Decimal places of a display unit.
pub const UNIT_DECIMALS: usize = 9;

/// Parses a display amount such as `"1.5"` into lamports without going
/// through floating point.
pub fn parse_units(amount: &str) -> Result<u64, ZkaaError> {
    let invalid = |reason: &str| ZkaaError::InvalidInput(format!("amount {amount:?} {reason}"));

    let trimmed = amount.trim();
    let (whole, frac) = trimmed.split_once('.').unwrap_or((trimmed, ""));
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid("is empty"));
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("is not a decimal number"));
    }
    if frac.len() > UNIT_DECIMALS {
        return Err(invalid("has more than 9 decimal places"));
    }

    let whole: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid("is too large"))?
    };
    let frac: u64 = if frac.is_empty() {
        0
    } else {
        format!("{frac:0<width$}", width = UNIT_DECIMALS)
            .parse()
            .map_err(|_| invalid("is not a decimal number"))?
    };

    whole
        .checked_mul(LAMPORTS_PER_UNIT)
        .and_then(|lamports| lamports.checked_add(frac))
        .ok_or_else(|| invalid("is too large"))
}

/// Validates a transfer
pub fn validate_transfer(
    source: &Address,
    destination: &Address,
    amount: u64,
) -> Result<(), ZkaaError> {
    if amount == 0 {
        return Err(ZkaaError::InvalidInput(
            "transfer amount must be positive".into(),
        ));
    }
    if source == destination {
        return Err(ZkaaError::InvalidInput(
            "destination must differ from source".into(),
        ));
    }
    Ok(())
}

/// Fails with `InsufficientBalance` when a known available balance cannot
/// cover `amount`. The ledger re-checks; this only saves a round-trip.
pub fn validate_available(amount: u64, available: u64) -> Result<(), ZkaaError> {
    if amount > available {
        return Err(ZkaaError::InsufficientBalance {
            required: amount,
            available,
        });
    }
    Ok(())
}
