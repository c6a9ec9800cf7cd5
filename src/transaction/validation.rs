use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::model::{Transaction, TransactionOutput};
use super::utxo::UtxoSet;
use crate::error::TransactionError;

/// How much of a transaction is checked before it may touch the UTXO set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationPolicy {
    /// Signature, amount sign, input resolution and ownership, funds, and
    /// output id collisions are all enforced.
    #[default]
    Strict,
    /// Signature only. Unresolved inputs count as zero and change may go
    /// negative.
    Permissive,
}

impl FromStr for ValidationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "permissive" => Ok(Self::Permissive),
            other => Err(format!("unknown validation policy: {other}")),
        }
    }
}

impl fmt::Display for ValidationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => f.write_str("strict"),
            Self::Permissive => f.write_str("permissive"),
        }
    }
}

/// Outcome of a successful `check`: what `commit` will do to the UTXO set.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    transaction_id: String,
    /// One entry per input, in input order. `None` for unresolved inputs
    /// (only possible under the permissive policy).
    resolved: Vec<Option<TransactionOutput>>,
    /// Receiver's output first, then the sender's change.
    outputs: Vec<TransactionOutput>,
}

impl Settlement {
    pub fn inputs_sum(&self) -> f64 {
        self.resolved.iter().flatten().map(|o| o.amount).sum()
    }

    pub fn outputs(&self) -> &[TransactionOutput] {
        &self.outputs
    }

    /// Ids of the outputs that will be removed from the UTXO set.
    pub fn consumed_ids(&self) -> impl Iterator<Item = &str> {
        self.resolved.iter().flatten().map(|o| o.id.as_str())
    }

    pub fn change(&self) -> f64 {
        self.outputs.get(1).map(|o| o.amount).unwrap_or_default()
    }
}

/// Pure validation phase. Nothing is mutated; the returned `Settlement`
/// carries the resolved inputs and the outputs to create.
pub fn check(
    tx: &Transaction,
    utxos: &UtxoSet,
    policy: ValidationPolicy,
) -> Result<Settlement, TransactionError> {
    if !tx.verify_signature() {
        return Err(TransactionError::InvalidSignature);
    }

    let strict = policy == ValidationPolicy::Strict;

    if strict {
        if !tx.amount.is_finite() || tx.amount < 0.0 {
            return Err(TransactionError::NegativeAmount(tx.amount));
        }
        if !tx.outputs.is_empty() {
            return Err(TransactionError::AlreadySettled(tx.transaction_id.clone()));
        }
        let mut seen = HashSet::new();
        for input in &tx.inputs {
            if !seen.insert(input.transaction_output_id.as_str()) {
                return Err(TransactionError::DuplicateInput(
                    input.transaction_output_id.clone(),
                ));
            }
        }
    }

    let mut resolved = Vec::with_capacity(tx.inputs.len());
    for input in &tx.inputs {
        let utxo = utxos.get(&input.transaction_output_id).cloned();
        if strict {
            match &utxo {
                None => {
                    return Err(TransactionError::UnresolvedInput(
                        input.transaction_output_id.clone(),
                    ));
                }
                Some(out) if !out.is_mine(&tx.sender) => {
                    return Err(TransactionError::ForeignInput(out.id.clone()));
                }
                Some(_) => {}
            }
        } else if utxo.is_none() {
            debug!(
                "tx {}: input {} unresolved, counted as zero",
                tx.transaction_id, input.transaction_output_id
            );
        }
        resolved.push(utxo);
    }

    let inputs_sum: f64 = resolved.iter().flatten().map(|o| o.amount).sum();
    let change = inputs_sum - tx.amount;
    if strict && change < 0.0 {
        return Err(TransactionError::InsufficientFunds {
            required: tx.amount,
            available: inputs_sum,
        });
    }

    let outputs = vec![
        TransactionOutput::new(&tx.transaction_id, &tx.receiver, tx.amount),
        TransactionOutput::new(&tx.transaction_id, &tx.sender, change),
    ];

    if strict {
        if outputs[0].id == outputs[1].id {
            return Err(TransactionError::OutputCollision(outputs[0].id.clone()));
        }
        if let Some(out) = outputs.iter().find(|o| utxos.contains(&o.id)) {
            return Err(TransactionError::OutputCollision(out.id.clone()));
        }
    }

    Ok(Settlement {
        transaction_id: tx.transaction_id.clone(),
        resolved,
        outputs,
    })
}

/// Apply a `Settlement` produced by `check` for the same transaction:
/// record resolved inputs, append and insert the new outputs, then remove
/// every consumed output. A settlement checked against another transaction
/// is refused before anything is touched.
pub fn commit(
    tx: &mut Transaction,
    settlement: Settlement,
    utxos: &mut UtxoSet,
) -> Result<(), TransactionError> {
    if tx.transaction_id != settlement.transaction_id
        || tx.inputs.len() != settlement.resolved.len()
    {
        return Err(TransactionError::SettlementMismatch {
            expected: tx.transaction_id.clone(),
            found: settlement.transaction_id,
        });
    }

    let Settlement {
        resolved, outputs, ..
    } = settlement;

    for (input, utxo) in tx.inputs.iter_mut().zip(resolved) {
        input.utxo = utxo;
    }

    for out in outputs {
        utxos.insert(out.clone());
        tx.outputs.push(out);
    }

    for input in &tx.inputs {
        if let Some(utxo) = &input.utxo {
            utxos.spend(&utxo.id);
        }
    }
    Ok(())
}

/// `check` followed by `commit`. On error the UTXO set and the transaction
/// are left untouched.
pub fn validate(
    tx: &mut Transaction,
    utxos: &mut UtxoSet,
    policy: ValidationPolicy,
) -> Result<(), TransactionError> {
    match check(tx, utxos, policy) {
        Ok(settlement) => {
            debug!(
                "tx {} settles: inputs_sum={:.6} amount={:.6} change={:.6}",
                tx.transaction_id,
                settlement.inputs_sum(),
                tx.amount,
                settlement.change()
            );
            commit(tx, settlement, utxos)
        }
        Err(e) => {
            warn!("tx {} rejected: {}", tx.transaction_id, e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::transaction::TransactionInput;

    struct Fixture {
        alice: KeyPair,
        bob: KeyPair,
        utxos: UtxoSet,
        funding: TransactionOutput,
    }

    fn fixture(funds: f64) -> Fixture {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();
        let funding = TransactionOutput::new("0", &alice.public_key_hex(), funds);
        let mut utxos = UtxoSet::new();
        utxos.insert(funding.clone());
        Fixture {
            alice,
            bob,
            utxos,
            funding,
        }
    }

    fn transfer(f: &Fixture, amount: f64) -> Transaction {
        let mut tx = Transaction::new(&f.alice.public_key_hex(), &f.bob.public_key_hex(), amount);
        tx.add_input(TransactionInput::new(f.funding.id.clone()));
        tx.sign(&f.alice);
        tx
    }

    #[test]
    fn valid_transfer_creates_two_outputs_and_consumes_inputs() {
        let mut f = fixture(50.0);
        let mut tx = transfer(&f, 20.0);

        validate(&mut tx, &mut f.utxos, ValidationPolicy::Strict).unwrap();

        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(tx.outputs[0].receiver, f.bob.public_key_hex());
        assert_eq!(tx.outputs[0].amount, 20.0);
        assert_eq!(tx.outputs[1].receiver, f.alice.public_key_hex());
        assert_eq!(tx.outputs[1].amount, 30.0);
        assert_eq!(tx.outputs_sum(), tx.inputs_sum());

        assert!(!f.utxos.contains(&f.funding.id));
        assert_eq!(f.utxos.len(), 2);
        assert_eq!(f.utxos.balance_of(&f.bob.public_key_hex()), 20.0);
        assert_eq!(f.utxos.balance_of(&f.alice.public_key_hex()), 30.0);
        assert_eq!(tx.inputs[0].utxo.as_ref(), Some(&f.funding));
    }

    #[test]
    fn check_is_pure() {
        let f = fixture(50.0);
        let tx = transfer(&f, 20.0);
        let before = f.utxos.snapshot();

        let settlement = check(&tx, &f.utxos, ValidationPolicy::Strict).unwrap();
        assert_eq!(settlement.inputs_sum(), 50.0);
        assert_eq!(settlement.change(), 30.0);
        assert_eq!(settlement.outputs().len(), 2);
        assert_eq!(settlement.consumed_ids().collect::<Vec<_>>(), vec![f.funding.id.as_str()]);

        assert_eq!(f.utxos.snapshot(), before);
        assert!(tx.outputs.is_empty());
    }

    #[test]
    fn commit_refuses_settlement_of_another_transaction() {
        let mut f = fixture(50.0);
        let checked = transfer(&f, 20.0);
        let settlement = check(&checked, &f.utxos, ValidationPolicy::Strict).unwrap();
        let before = f.utxos.snapshot();

        let mut other = transfer(&f, 5.0);
        assert_eq!(
            commit(&mut other, settlement, &mut f.utxos),
            Err(TransactionError::SettlementMismatch {
                expected: other.transaction_id.clone(),
                found: checked.transaction_id.clone(),
            })
        );
        assert_eq!(f.utxos.snapshot(), before);
        assert!(other.outputs.is_empty());
        assert!(other.inputs[0].utxo.is_none());
    }

    #[test]
    fn tampered_transactions_leave_utxos_unchanged() {
        let f = fixture(50.0);
        let signed = transfer(&f, 20.0);
        let carol = KeyPair::generate();

        let mut amount = signed.clone();
        amount.amount = 40.0;
        let mut receiver = signed.clone();
        receiver.receiver = carol.public_key_hex();
        let mut sender = signed.clone();
        sender.sender = carol.public_key_hex();
        let mut signature = signed.clone();
        let flipped = if signature.signature.ends_with('0') { '1' } else { '0' };
        signature.signature.pop();
        signature.signature.push(flipped);

        for mut tx in [amount, receiver, sender, signature] {
            let mut utxos = f.utxos.clone();
            let before = utxos.snapshot();
            for policy in [ValidationPolicy::Strict, ValidationPolicy::Permissive] {
                assert_eq!(
                    validate(&mut tx, &mut utxos, policy),
                    Err(TransactionError::InvalidSignature)
                );
            }
            assert_eq!(utxos.snapshot(), before);
            assert!(tx.outputs.is_empty());
        }
    }

    #[test]
    fn strict_rejects_unresolved_input() {
        let mut f = fixture(50.0);
        let mut tx = Transaction::new(&f.alice.public_key_hex(), &f.bob.public_key_hex(), 1.0);
        tx.add_input(TransactionInput::new("nope"));
        tx.sign(&f.alice);
        assert_eq!(
            validate(&mut tx, &mut f.utxos, ValidationPolicy::Strict),
            Err(TransactionError::UnresolvedInput("nope".into()))
        );
        assert_eq!(f.utxos.len(), 1);
    }

    #[test]
    fn permissive_counts_unresolved_as_zero_and_allows_negative_change() {
        let mut f = fixture(50.0);
        let mut tx = Transaction::new(&f.alice.public_key_hex(), &f.bob.public_key_hex(), 1.0);
        tx.add_input(TransactionInput::new("nope"));
        tx.sign(&f.alice);

        validate(&mut tx, &mut f.utxos, ValidationPolicy::Permissive).unwrap();
        assert_eq!(tx.outputs[1].amount, -1.0);
        assert!(tx.inputs[0].utxo.is_none());
        // funding untouched, two new outputs
        assert_eq!(f.utxos.len(), 3);
    }

    #[test]
    fn strict_rejects_overspend() {
        let mut f = fixture(5.0);
        let mut tx = transfer(&f, 6.0);
        assert_eq!(
            validate(&mut tx, &mut f.utxos, ValidationPolicy::Strict),
            Err(TransactionError::InsufficientFunds {
                required: 6.0,
                available: 5.0
            })
        );
    }

    #[test]
    fn strict_rejects_negative_amount() {
        let mut f = fixture(5.0);
        let mut tx = transfer(&f, -1.0);
        assert_eq!(
            validate(&mut tx, &mut f.utxos, ValidationPolicy::Strict),
            Err(TransactionError::NegativeAmount(-1.0))
        );
    }

    #[test]
    fn strict_rejects_foreign_and_duplicate_inputs() {
        let mut f = fixture(5.0);
        let bobs = TransactionOutput::new("0", &f.bob.public_key_hex(), 9.0);
        f.utxos.insert(bobs.clone());

        let mut steal = Transaction::new(&f.alice.public_key_hex(), &f.bob.public_key_hex(), 1.0);
        steal.add_input(TransactionInput::new(bobs.id.clone()));
        steal.sign(&f.alice);
        assert_eq!(
            validate(&mut steal, &mut f.utxos, ValidationPolicy::Strict),
            Err(TransactionError::ForeignInput(bobs.id.clone()))
        );

        let mut twice = transfer(&f, 1.0);
        twice.add_input(TransactionInput::new(f.funding.id.clone()));
        assert_eq!(
            validate(&mut twice, &mut f.utxos, ValidationPolicy::Strict),
            Err(TransactionError::DuplicateInput(f.funding.id.clone()))
        );
    }

    #[test]
    fn strict_rejects_revalidation() {
        let mut f = fixture(50.0);
        let mut tx = transfer(&f, 20.0);
        validate(&mut tx, &mut f.utxos, ValidationPolicy::Strict).unwrap();
        let before = f.utxos.snapshot();
        assert_eq!(
            validate(&mut tx, &mut f.utxos, ValidationPolicy::Strict),
            Err(TransactionError::AlreadySettled(tx.transaction_id.clone()))
        );
        assert_eq!(f.utxos.snapshot(), before);
        assert_eq!(tx.outputs.len(), 2);
    }

    #[test]
    fn strict_rejects_output_collision() {
        let mut f = fixture(50.0);
        let tx = transfer(&f, 20.0);
        let squatter = TransactionOutput::new(&tx.transaction_id, &f.bob.public_key_hex(), 20.0);
        f.utxos.insert(squatter.clone());

        let mut tx = tx;
        assert_eq!(
            validate(&mut tx, &mut f.utxos, ValidationPolicy::Strict),
            Err(TransactionError::OutputCollision(squatter.id))
        );
    }

    #[test]
    fn policy_parses_from_text() {
        assert_eq!("Strict".parse::<ValidationPolicy>(), Ok(ValidationPolicy::Strict));
        assert_eq!(" permissive ".parse::<ValidationPolicy>(), Ok(ValidationPolicy::Permissive));
        assert!("lenient".parse::<ValidationPolicy>().is_err());
        assert_eq!(ValidationPolicy::Permissive.to_string(), "permissive");
    }
}
