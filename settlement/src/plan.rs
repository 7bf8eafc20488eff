//! Transaction plan builder.
//!
//! A plan turns a transaction's offer path into an ordered list of hops,
//! payer's mint first, recipient's mint last. Each hop carries at most one
//! operation action and one crossing action with fully resolved amounts —
//! every amount is determined before any hop executes.

use scrip_client::{MintClient, OfferResource, TransactionResource};
use scrip_store::TransactionRecord;
use scrip_types::{codes, Address, Amount, AssetName, ObjectId, OpStatus, params::MAX_PATH_LENGTH};

use crate::SettlementError;

/// A planned balance movement: `amount` of `asset` from `source` to
/// `destination`, canonical at the asset issuer's mint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpAction {
    pub owner: Address,
    pub asset: AssetName,
    pub source: Option<Address>,
    pub destination: Option<Address>,
    /// `None` in shallow plans.
    pub amount: Option<Amount>,
}

/// A planned consumption of an offer's remainder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrAction {
    pub owner: Address,
    pub offer: ObjectId,
    /// `None` in shallow plans.
    pub amount: Option<Amount>,
}

/// One mint's position along the path.
#[derive(Clone, Debug)]
pub struct PlanHop {
    /// Host of the mint that executes this hop.
    pub mint: String,
    pub op: Option<OpAction>,
    pub cr: Option<CrAction>,
}

/// The execution plan of a transaction.
#[derive(Clone, Debug)]
pub struct TxPlan {
    pub transaction: ObjectId,
    pub hops: Vec<PlanHop>,
}

impl TxPlan {
    /// Build the plan for `tx`.
    ///
    /// A full plan resolves every offer in the path through the client and
    /// computes amounts. A shallow plan derives hop mints from the offer ids
    /// alone and carries no actions — enough to locate mints for settlement
    /// and cancellation routing.
    pub async fn compute(
        client: &dyn MintClient,
        tx: &TransactionRecord,
        shallow: bool,
    ) -> Result<TxPlan, SettlementError> {
        if tx.path.len() > MAX_PATH_LENGTH {
            return Err(SettlementError::transaction_failed(format!(
                "path of {} offers exceeds the maximum of {MAX_PATH_LENGTH}",
                tx.path.len()
            )));
        }

        let mut offers = Vec::with_capacity(tx.path.len());
        if !shallow {
            for id in &tx.path {
                let offer = client.retrieve_offer(id).await?;
                if &offer.id != id || offer.id.owner() != &offer.owner {
                    return Err(SettlementError::plan_mismatch(format!(
                        "offer {id} advertised inconsistent identity"
                    )));
                }
                offers.push(offer);
            }
        }

        let mut hops = Vec::with_capacity(tx.path.len() + 2);

        // When someone else issues the base asset, the owner's mint gets a
        // leading actionless hop so it still observes the transaction and
        // can drive cancellation.
        let base_issuer = tx.base_asset.issuer().clone();
        if base_issuer != tx.owner {
            hops.push(PlanHop {
                mint: tx.owner.host().to_string(),
                op: None,
                cr: None,
            });
        }

        // The base-asset operation: from the transaction owner towards the
        // first offer's owner (or straight to the destination on an empty
        // path).
        let first_destination = match tx.path.first() {
            Some(id) => id.owner().clone(),
            None => tx.destination.clone(),
        };
        hops.push(PlanHop {
            mint: base_issuer.host().to_string(),
            op: Some(OpAction {
                owner: base_issuer,
                asset: tx.base_asset.clone(),
                source: Some(tx.owner.clone()),
                destination: Some(first_destination),
                amount: None,
            }),
            cr: None,
        });

        if shallow {
            // Hop mints come straight from the offer ids.
            for id in &tx.path {
                hops.push(PlanHop {
                    mint: id.host().to_string(),
                    op: None,
                    cr: None,
                });
            }
            return Ok(TxPlan {
                transaction: tx.id.clone(),
                hops,
            });
        }

        // Structural pass: the asset chain must telescope from the base
        // asset through every offer's quote into the transaction's quote.
        let mut running = tx.base_asset.clone();
        for (i, offer) in offers.iter().enumerate() {
            if offer.quote_asset != running {
                return Err(SettlementError::plan_mismatch(format!(
                    "offer {} quotes {}, path delivers {running}",
                    offer.id, offer.quote_asset
                )));
            }
            if offer.base_asset.issuer() != &offer.owner {
                return Err(SettlementError::plan_mismatch(format!(
                    "offer {} owner does not issue its base asset {}",
                    offer.id, offer.base_asset
                )));
            }
            let next_destination = match offers.get(i + 1) {
                Some(next) => next.owner.clone(),
                None => tx.destination.clone(),
            };
            hops.push(PlanHop {
                mint: offer.owner.host().to_string(),
                op: Some(OpAction {
                    owner: offer.owner.clone(),
                    asset: offer.base_asset.clone(),
                    source: Some(offer.owner.clone()),
                    destination: Some(next_destination),
                    amount: None,
                }),
                cr: Some(CrAction {
                    owner: offer.owner.clone(),
                    offer: offer.id.clone(),
                    amount: None,
                }),
            });
            running = offer.base_asset.clone();
        }
        if running != tx.quote_asset {
            return Err(SettlementError::plan_mismatch(format!(
                "path delivers {running}, transaction wants {}",
                tx.quote_asset
            )));
        }

        let mut plan = TxPlan {
            transaction: tx.id.clone(),
            hops,
        };
        plan.compute_amounts(tx, &offers)?;
        Ok(plan)
    }

    /// Amount pass: walk the offers back to front. The last operation moves
    /// the transaction amount; each offer's crossing absorbs
    /// `ceil(op_amount * base_price / quote_price)` of its quote asset —
    /// the one-unit rounding cost is charged to the initiating owner — and
    /// that quote amount is what the preceding operation must deliver.
    fn compute_amounts(
        &mut self,
        tx: &TransactionRecord,
        offers: &[OfferResource],
    ) -> Result<(), SettlementError> {
        let first_op_hop = self.hops.len() - offers.len() - 1;
        let mut amount = tx.amount;

        for (i, offer) in offers.iter().enumerate().rev() {
            let hop = &mut self.hops[first_op_hop + 1 + i];
            if let Some(op) = hop.op.as_mut() {
                op.amount = Some(amount);
            }
            let crossing = amount
                .checked_mul_div_ceil(offer.base_price, offer.quote_price)
                .ok_or_else(|| {
                    SettlementError::amount_invalid(format!(
                        "amount conversion overflows on offer {}",
                        offer.id
                    ))
                })?;
            if crossing > offer.remainder {
                return Err(SettlementError::User(
                    scrip_types::UserError::payment_required(
                        codes::INSUFFICIENT_REMAINDER,
                        format!(
                            "offer {} cannot absorb {crossing}, {} remaining",
                            offer.id, offer.remainder
                        ),
                    ),
                ));
            }
            if let Some(cr) = hop.cr.as_mut() {
                cr.amount = Some(crossing);
            }
            amount = crossing;
        }

        if let Some(op) = self.hops[first_op_hop].op.as_mut() {
            op.amount = Some(amount);
        }
        Ok(())
    }

    pub fn hop(&self, hop: u8) -> Result<&PlanHop, SettlementError> {
        self.hops.get(hop as usize).ok_or_else(|| {
            SettlementError::hop_invalid(format!(
                "hop {hop} out of range, plan has {} hops",
                self.hops.len()
            ))
        })
    }

    /// Re-fetch the transaction from the mint executing `hop` and assert the
    /// advertised operation and crossing exactly match this plan's actions.
    /// This is the sole defense against a remote mint fabricating or
    /// omitting state.
    pub async fn check(
        &self,
        client: &dyn MintClient,
        hop: u8,
    ) -> Result<(), SettlementError> {
        let planned = self.hop(hop)?;
        let advertised = client
            .retrieve_transaction(&self.transaction, Some(&planned.mint))
            .await?;

        if let Some(op) = &planned.op {
            check_operation(&advertised, op, hop)?;
        }
        if let Some(cr) = &planned.cr {
            check_crossing(&advertised, cr, hop)?;
        }
        Ok(())
    }

    /// The lowest and highest hop indices executed by `host`. A mint asked
    /// to act on a transaction whose plan never names it has no business
    /// doing so.
    pub fn min_max_hop(&self, host: &str) -> Result<(u8, u8), SettlementError> {
        let mut bounds: Option<(u8, u8)> = None;
        for (i, hop) in self.hops.iter().enumerate() {
            if hop.mint == host {
                let i = i as u8;
                bounds = Some(match bounds {
                    None => (i, i),
                    Some((min, _)) => (min, i),
                });
            }
        }
        bounds.ok_or_else(|| {
            SettlementError::transaction_failed(format!(
                "mint {host} does not appear in the plan of {}",
                self.transaction
            ))
        })
    }
}

fn check_operation(
    advertised: &TransactionResource,
    planned: &OpAction,
    hop: u8,
) -> Result<(), SettlementError> {
    let mismatch = |what: &str| {
        SettlementError::transaction_failed(format!(
            "hop {hop} of {} advertises a mismatched operation: {what}",
            advertised.id
        ))
    };
    let op = advertised
        .operation_at(hop)
        .ok_or_else(|| mismatch("missing"))?;
    if op.status == OpStatus::Canceled {
        return Err(mismatch("canceled"));
    }
    if op.owner != planned.owner {
        return Err(mismatch("owner"));
    }
    if op.asset != planned.asset {
        return Err(mismatch("asset"));
    }
    if op.source != planned.source {
        return Err(mismatch("source"));
    }
    if op.destination != planned.destination {
        return Err(mismatch("destination"));
    }
    if Some(op.amount) != planned.amount {
        return Err(mismatch("amount"));
    }
    Ok(())
}

fn check_crossing(
    advertised: &TransactionResource,
    planned: &CrAction,
    hop: u8,
) -> Result<(), SettlementError> {
    let mismatch = |what: &str| {
        SettlementError::transaction_failed(format!(
            "hop {hop} of {} advertises a mismatched crossing: {what}",
            advertised.id
        ))
    };
    let cr = advertised
        .crossing_at(hop)
        .ok_or_else(|| mismatch("missing"))?;
    if cr.status == OpStatus::Canceled {
        return Err(mismatch("canceled"));
    }
    if cr.owner != planned.owner {
        return Err(mismatch("owner"));
    }
    if cr.offer != planned.offer {
        return Err(mismatch("offer"));
    }
    if Some(cr.amount) != planned.amount {
        return Err(mismatch("amount"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use proptest::prelude::*;
    use std::collections::HashMap;

    use scrip_client::{
        BalanceResource, ClientError, OperationResource, TransactionResource,
    };
    use scrip_types::{PropagationType, Timestamp, TxStatus};

    struct StubClient {
        offers: HashMap<String, OfferResource>,
    }

    impl StubClient {
        fn new(offers: Vec<OfferResource>) -> Self {
            Self {
                offers: offers
                    .into_iter()
                    .map(|o| (o.id.to_string(), o))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl MintClient for StubClient {
        async fn retrieve_offer(&self, id: &ObjectId) -> Result<OfferResource, ClientError> {
            self.offers
                .get(&id.to_string())
                .cloned()
                .ok_or_else(|| ClientError::remote(404, codes::OFFER_NOT_FOUND, "no such offer"))
        }

        async fn retrieve_operation(
            &self,
            _id: &ObjectId,
        ) -> Result<OperationResource, ClientError> {
            Err(ClientError::remote(404, codes::OPERATION_NOT_FOUND, "stub"))
        }

        async fn retrieve_balance(&self, _id: &ObjectId) -> Result<BalanceResource, ClientError> {
            Err(ClientError::remote(404, codes::BALANCE_NOT_FOUND, "stub"))
        }

        async fn retrieve_transaction(
            &self,
            _id: &ObjectId,
            _mint: Option<&str>,
        ) -> Result<TransactionResource, ClientError> {
            Err(ClientError::remote(404, codes::TRANSACTION_NOT_FOUND, "stub"))
        }

        async fn propagate_offer(
            &self,
            _id: &ObjectId,
            _mint: &str,
        ) -> Result<OfferResource, ClientError> {
            Err(ClientError::remote(404, codes::OFFER_NOT_FOUND, "stub"))
        }

        async fn propagate_operation(
            &self,
            _id: &ObjectId,
            _mint: &str,
        ) -> Result<OperationResource, ClientError> {
            Err(ClientError::remote(404, codes::OPERATION_NOT_FOUND, "stub"))
        }

        async fn propagate_balance(
            &self,
            _id: &ObjectId,
            _mint: &str,
        ) -> Result<BalanceResource, ClientError> {
            Err(ClientError::remote(404, codes::BALANCE_NOT_FOUND, "stub"))
        }

        async fn create_transaction(
            &self,
            _id: &ObjectId,
            _hop: u8,
            _mint: &str,
        ) -> Result<TransactionResource, ClientError> {
            Err(ClientError::remote(404, codes::TRANSACTION_NOT_FOUND, "stub"))
        }

        async fn settle_transaction(
            &self,
            _id: &ObjectId,
            _hop: u8,
            _secret: &str,
            _mint: &str,
        ) -> Result<TransactionResource, ClientError> {
            Err(ClientError::remote(404, codes::TRANSACTION_NOT_FOUND, "stub"))
        }

        async fn cancel_transaction(
            &self,
            _id: &ObjectId,
            _hop: u8,
            _mint: &str,
        ) -> Result<TransactionResource, ClientError> {
            Err(ClientError::remote(404, codes::TRANSACTION_NOT_FOUND, "stub"))
        }
    }

    fn addr(s: &str) -> Address {
        Address::parse(s).unwrap()
    }

    fn asset(s: &str) -> AssetName {
        AssetName::parse(s).unwrap()
    }

    fn offer(
        id: &str,
        base: &str,
        quote: &str,
        base_price: u128,
        quote_price: u128,
        remainder: u128,
    ) -> OfferResource {
        let id = ObjectId::parse(id).unwrap();
        OfferResource {
            owner: id.owner().clone(),
            id,
            base_asset: asset(base),
            quote_asset: asset(quote),
            base_price: Amount::new(base_price),
            quote_price: Amount::new(quote_price),
            amount: Amount::new(remainder),
            status: scrip_types::OfferStatus::Active,
            remainder: Amount::new(remainder),
            created: Timestamp::new(1),
        }
    }

    fn transaction(
        owner: &str,
        base: &str,
        quote: &str,
        amount: u128,
        destination: &str,
        path: Vec<&str>,
    ) -> TransactionRecord {
        TransactionRecord {
            id: ObjectId::new(addr(owner), "transaction_0001"),
            owner: addr(owner),
            base_asset: asset(base),
            quote_asset: asset(quote),
            amount: Amount::new(amount),
            destination: addr(destination),
            path: path.into_iter().map(|p| ObjectId::parse(p).unwrap()).collect(),
            status: TxStatus::Pending,
            lock: "lock".to_string(),
            secret: None,
            propagation: PropagationType::Canonical,
            created: Timestamp::new(1),
        }
    }

    #[tokio::test]
    async fn direct_transfer_plan_has_one_hop() {
        let client = StubClient::new(vec![]);
        let tx = transaction(
            "issuer@mint-a.example",
            "issuer@mint-a.example:USD.2",
            "issuer@mint-a.example:USD.2",
            10,
            "bob@mint-a.example",
            vec![],
        );
        let plan = TxPlan::compute(&client, &tx, false).await.unwrap();
        assert_eq!(plan.hops.len(), 1);
        let op = plan.hops[0].op.as_ref().unwrap();
        assert_eq!(op.amount, Some(Amount::new(10)));
        assert_eq!(op.source.as_ref().unwrap().to_string(), "issuer@mint-a.example");
        assert_eq!(op.destination.as_ref().unwrap().to_string(), "bob@mint-a.example");
        assert!(plan.hops[0].cr.is_none());
    }

    #[tokio::test]
    async fn foreign_base_asset_prepends_observer_hop() {
        let client = StubClient::new(vec![]);
        let tx = transaction(
            "alice@payer-mint.example",
            "issuer@mint-a.example:USD.2",
            "issuer@mint-a.example:USD.2",
            10,
            "bob@mint-a.example",
            vec![],
        );
        let plan = TxPlan::compute(&client, &tx, false).await.unwrap();
        assert_eq!(plan.hops.len(), 2);
        assert_eq!(plan.hops[0].mint, "payer-mint.example");
        assert!(plan.hops[0].op.is_none());
        assert!(plan.hops[0].cr.is_none());
        assert_eq!(plan.hops[1].mint, "mint-a.example");
    }

    #[tokio::test]
    async fn offer_path_telescopes_and_computes_amounts() {
        let client = StubClient::new(vec![
            offer(
                "bob@mint-b.example[offer_b]",
                "bob@mint-b.example:USD.2",
                "issuer@mint-a.example:USD.2",
                1,
                1,
                100,
            ),
            offer(
                "carol@mint-c.example[offer_c]",
                "carol@mint-c.example:USD.2",
                "bob@mint-b.example:USD.2",
                1,
                1,
                100,
            ),
        ]);
        let tx = transaction(
            "alice@mint-a.example",
            "issuer@mint-a.example:USD.2",
            "carol@mint-c.example:USD.2",
            10,
            "dave@mint-c.example",
            vec!["bob@mint-b.example[offer_b]", "carol@mint-c.example[offer_c]"],
        );
        let plan = TxPlan::compute(&client, &tx, false).await.unwrap();

        // observer hop + base op hop + two offer hops
        assert_eq!(plan.hops.len(), 4);
        assert_eq!(plan.hops[0].mint, "mint-a.example");
        assert_eq!(plan.hops[1].mint, "mint-a.example");
        assert_eq!(plan.hops[2].mint, "mint-b.example");
        assert_eq!(plan.hops[3].mint, "mint-c.example");

        // At 1/1 prices every amount is the transaction amount.
        let base_op = plan.hops[1].op.as_ref().unwrap();
        assert_eq!(base_op.amount, Some(Amount::new(10)));
        assert_eq!(base_op.destination.as_ref().unwrap().to_string(), "bob@mint-b.example");

        let b_hop = &plan.hops[2];
        assert_eq!(b_hop.cr.as_ref().unwrap().amount, Some(Amount::new(10)));
        assert_eq!(b_hop.op.as_ref().unwrap().amount, Some(Amount::new(10)));
        assert_eq!(
            b_hop.op.as_ref().unwrap().destination.as_ref().unwrap().to_string(),
            "carol@mint-c.example"
        );

        let c_hop = &plan.hops[3];
        assert_eq!(c_hop.op.as_ref().unwrap().amount, Some(Amount::new(10)));
        assert_eq!(
            c_hop.op.as_ref().unwrap().destination.as_ref().unwrap().to_string(),
            "dave@mint-c.example"
        );
    }

    #[tokio::test]
    async fn rounding_charges_the_initiator() {
        // 10 units out of the offer at 2/3: the crossing absorbs
        // ceil(10 * 2 / 3) = 7 quote units.
        let client = StubClient::new(vec![offer(
            "bob@mint-b.example[offer_b]",
            "bob@mint-b.example:USD.2",
            "issuer@mint-a.example:USD.2",
            2,
            3,
            100,
        )]);
        let tx = transaction(
            "alice@mint-a.example",
            "issuer@mint-a.example:USD.2",
            "bob@mint-b.example:USD.2",
            10,
            "dave@mint-b.example",
            vec!["bob@mint-b.example[offer_b]"],
        );
        let plan = TxPlan::compute(&client, &tx, false).await.unwrap();

        let offer_hop = &plan.hops[2];
        assert_eq!(offer_hop.op.as_ref().unwrap().amount, Some(Amount::new(10)));
        assert_eq!(offer_hop.cr.as_ref().unwrap().amount, Some(Amount::new(7)));
        // The preceding operation delivers exactly the crossing amount.
        assert_eq!(plan.hops[1].op.as_ref().unwrap().amount, Some(Amount::new(7)));
    }

    #[tokio::test]
    async fn insufficient_remainder_is_rejected() {
        let client = StubClient::new(vec![offer(
            "bob@mint-b.example[offer_b]",
            "bob@mint-b.example:USD.2",
            "issuer@mint-a.example:USD.2",
            1,
            1,
            5,
        )]);
        let tx = transaction(
            "alice@mint-a.example",
            "issuer@mint-a.example:USD.2",
            "bob@mint-b.example:USD.2",
            10,
            "dave@mint-b.example",
            vec!["bob@mint-b.example[offer_b]"],
        );
        let err = TxPlan::compute(&client, &tx, false).await.unwrap_err();
        assert_eq!(err.code(), Some(codes::INSUFFICIENT_REMAINDER));
    }

    #[tokio::test]
    async fn broken_asset_chain_is_plan_mismatch() {
        let client = StubClient::new(vec![offer(
            "bob@mint-b.example[offer_b]",
            "bob@mint-b.example:USD.2",
            "someone@else.example:EUR.2",
            1,
            1,
            100,
        )]);
        let tx = transaction(
            "alice@mint-a.example",
            "issuer@mint-a.example:USD.2",
            "bob@mint-b.example:USD.2",
            10,
            "dave@mint-b.example",
            vec!["bob@mint-b.example[offer_b]"],
        );
        let err = TxPlan::compute(&client, &tx, false).await.unwrap_err();
        assert_eq!(err.code(), Some(codes::PLAN_MISMATCH));
    }

    #[tokio::test]
    async fn final_asset_must_match_quote() {
        let client = StubClient::new(vec![offer(
            "bob@mint-b.example[offer_b]",
            "bob@mint-b.example:USD.2",
            "issuer@mint-a.example:USD.2",
            1,
            1,
            100,
        )]);
        let tx = transaction(
            "alice@mint-a.example",
            "issuer@mint-a.example:USD.2",
            "carol@mint-c.example:USD.2",
            10,
            "dave@mint-c.example",
            vec!["bob@mint-b.example[offer_b]"],
        );
        let err = TxPlan::compute(&client, &tx, false).await.unwrap_err();
        assert_eq!(err.code(), Some(codes::PLAN_MISMATCH));
    }

    #[tokio::test]
    async fn shallow_plan_routes_without_fetching() {
        // The stub has no offers registered: a full plan would fail.
        let client = StubClient::new(vec![]);
        let tx = transaction(
            "alice@mint-a.example",
            "issuer@mint-a.example:USD.2",
            "carol@mint-c.example:USD.2",
            10,
            "dave@mint-c.example",
            vec!["bob@mint-b.example[offer_b]", "carol@mint-c.example[offer_c]"],
        );
        let plan = TxPlan::compute(&client, &tx, true).await.unwrap();
        let mints: Vec<&str> = plan.hops.iter().map(|h| h.mint.as_str()).collect();
        assert_eq!(
            mints,
            vec!["mint-a.example", "mint-a.example", "mint-b.example", "mint-c.example"]
        );
        assert!(plan.hops.iter().all(|h| h.op.is_none() && h.cr.is_none()));
    }

    #[tokio::test]
    async fn min_max_hop_finds_local_span() {
        let client = StubClient::new(vec![]);
        let tx = transaction(
            "alice@mint-a.example",
            "issuer@mint-a.example:USD.2",
            "carol@mint-c.example:USD.2",
            10,
            "dave@mint-c.example",
            vec!["bob@mint-b.example[offer_b]", "carol@mint-c.example[offer_c]"],
        );
        let plan = TxPlan::compute(&client, &tx, true).await.unwrap();
        assert_eq!(plan.min_max_hop("mint-a.example").unwrap(), (0, 1));
        assert_eq!(plan.min_max_hop("mint-b.example").unwrap(), (2, 2));
        assert_eq!(plan.min_max_hop("mint-c.example").unwrap(), (3, 3));
        assert!(plan.min_max_hop("mint-x.example").is_err());
    }

    proptest! {
        #[test]
        fn crossing_never_underpays_the_offer(
            amount in 1u128..1u128 << 40,
            base_price in 1u128..1000u128,
            quote_price in 1u128..1000u128,
        ) {
            let crossing = Amount::new(amount)
                .checked_mul_div_ceil(Amount::new(base_price), Amount::new(quote_price))
                .unwrap()
                .raw();
            // The quote paid in covers the base paid out at the offer price.
            prop_assert!(crossing * quote_price >= amount * base_price);
            // And never overpays by a full unit.
            prop_assert!((crossing - 1) * quote_price < amount * base_price);
        }
    }
}
