use bigdecimal::BigDecimal;

use crate::error::MalformedRecord;
use crate::models::TransactionRecord;

/// Wei per ether, as a power of ten.
const WEI_DECIMALS: i64 = 18;

/// `gas_used * gas_price` rescaled from wei to ether. The product and the
/// rescale are exact; conversion to floating point happens on the averages.
pub fn fee_in_ether(tx: &TransactionRecord) -> Result<BigDecimal, MalformedRecord> {
    let gas_used = tx.gas_used.as_ref().ok_or_else(|| missing(tx, "gas_used"))?;
    let gas_price = tx.gas_price.as_ref().ok_or_else(|| missing(tx, "gas_price"))?;
    Ok(gas_used * gas_price * wei_to_ether())
}

fn wei_to_ether() -> BigDecimal {
    BigDecimal::new(1.into(), WEI_DECIMALS)
}

fn missing(tx: &TransactionRecord, field: &'static str) -> MalformedRecord {
    MalformedRecord {
        txid: tx.txid.clone(),
        field,
    }
}
