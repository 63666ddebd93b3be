//! Pairing engine - hands out machine × question pairs so that every pair is audited
//! exactly once per cycle, in random order.
//!
//! A cycle is the full cross-product of machines and questions stored as pairing tokens.
//! Tokens are generated in one transaction with a shuffled `priority`, handed out in
//! priority order, and consumed with a single conditional `UPDATE` so that at most one
//! caller can ever consume a given token. When no unconsumed token remains, the next
//! request for work starts a new cycle.

use crate::{
    core::catalog::{get_machine_by_id, get_question_by_id},
    entities::{Machine, PairingToken, Question, machine, pairing_token, question},
    errors::{Error, Result},
};
use rand::seq::SliceRandom;
use sea_orm::{
    QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*, sea_query::Expr,
};
use serde::Serialize;
use tracing::{debug, info};

/// Rows per `INSERT` when writing a new cycle.
const INSERT_CHUNK: usize = 500;

/// One pair of work handed to an auditor.
#[derive(Debug, Clone, Serialize)]
pub struct Assignment {
    /// Token to submit the result against
    pub token: pairing_token::Model,
    /// Machine to audit
    pub machine: machine::Model,
    /// Question to answer
    pub question: question::Model,
    /// Whether this request started a new cycle
    pub new_cycle: bool,
}

/// Answer to "what should be audited next?"
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NextItem {
    /// A pair is ready to be audited
    Assigned(Assignment),
    /// There are no machines or no questions to pair
    NoData,
}

/// Progress through the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CycleProgress {
    /// Tokens in the cycle
    pub total: u64,
    /// Tokens already audited
    pub consumed: u64,
    /// Tokens still open
    pub remaining: u64,
}

impl CycleProgress {
    /// A cycle is complete when nothing remains to be audited.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.remaining == 0
    }
}

/// Discards all tokens and writes a freshly shuffled cycle, atomically.
///
/// Returns the number of tokens created (machines × questions).
pub async fn start_new_cycle(db: &DatabaseConnection) -> Result<usize> {
    let txn = db.begin().await?;
    let created = start_new_cycle_in(&txn).await?;
    txn.commit().await?;
    Ok(created)
}

/// Same as [`start_new_cycle`] but inside a caller-owned transaction.
pub async fn start_new_cycle_in<C>(db: &C) -> Result<usize>
where
    C: ConnectionTrait,
{
    PairingToken::delete_many().exec(db).await?;

    let machine_ids: Vec<i64> = Machine::find()
        .select_only()
        .column(machine::Column::Id)
        .into_tuple()
        .all(db)
        .await?;
    let question_ids: Vec<i64> = Question::find()
        .select_only()
        .column(question::Column::Id)
        .into_tuple()
        .all(db)
        .await?;

    let mut pairs: Vec<(i64, i64)> = machine_ids
        .iter()
        .flat_map(|&m| question_ids.iter().map(move |&q| (m, q)))
        .collect();
    pairs.shuffle(&mut rand::thread_rng());

    let now = chrono::Utc::now();
    let tokens: Vec<pairing_token::ActiveModel> = pairs
        .iter()
        .zip(0_i64..)
        .map(|(&(machine_id, question_id), priority)| pairing_token::ActiveModel {
            machine_id: Set(machine_id),
            question_id: Set(question_id),
            priority: Set(priority),
            consumed: Set(false),
            created_at: Set(now),
            ..Default::default()
        })
        .collect();

    for chunk in tokens.chunks(INSERT_CHUNK) {
        PairingToken::insert_many(chunk.to_vec()).exec(db).await?;
    }

    info!("Created {} audit session pairs", tokens.len());
    Ok(tokens.len())
}

/// Returns the next unconsumed token, if any, without starting a new cycle.
pub async fn next_pair<C>(db: &C) -> Result<Option<pairing_token::Model>>
where
    C: ConnectionTrait,
{
    PairingToken::find()
        .filter(pairing_token::Column::Consumed.eq(false))
        .order_by_asc(pairing_token::Column::Priority)
        .order_by_asc(pairing_token::Column::Id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Marks a token consumed if, and only if, it exists and is still unconsumed.
///
/// This is a single conditional `UPDATE`, so concurrent callers racing on the same
/// token get exactly one winner; everyone else sees [`Error::InvalidOrAlreadyUsed`].
pub async fn consume<C>(db: &C, token_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = PairingToken::update_many()
        .col_expr(pairing_token::Column::Consumed, Expr::value(true))
        .filter(pairing_token::Column::Id.eq(token_id))
        .filter(pairing_token::Column::Consumed.eq(false))
        .exec(db)
        .await?;

    if result.rows_affected == 1 {
        Ok(())
    } else {
        Err(Error::InvalidOrAlreadyUsed { token_id })
    }
}

/// Finds a token by ID.
pub async fn get_token_by_id<C>(db: &C, token_id: i64) -> Result<Option<pairing_token::Model>>
where
    C: ConnectionTrait,
{
    PairingToken::find_by_id(token_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Picks the next pair for an auditor, starting a new cycle when the current one is done.
pub async fn next_assignment(db: &DatabaseConnection) -> Result<NextItem> {
    if Machine::find().count(db).await? == 0 || Question::find().count(db).await? == 0 {
        return Ok(NextItem::NoData);
    }

    let mut new_cycle = false;
    let token = match next_pair(db).await? {
        Some(token) => token,
        None => {
            new_cycle = restart_if_exhausted(db).await?;
            match next_pair(db).await? {
                Some(token) => token,
                None => return Ok(NextItem::NoData),
            }
        }
    };

    let machine = get_machine_by_id(db, token.machine_id)
        .await?
        .ok_or_else(|| Error::not_found("machine", token.machine_id))?;
    let question = get_question_by_id(db, token.question_id)
        .await?
        .ok_or_else(|| Error::not_found("question", token.question_id))?;

    debug!(
        "Assigning token {} ({} / {})",
        token.id, machine.name, question.code
    );

    Ok(NextItem::Assigned(Assignment {
        token,
        machine,
        question,
        new_cycle,
    }))
}

/// Starts a new cycle unless another caller already did.
///
/// The emptiness check runs inside the same transaction as the regeneration, so two
/// requests that both found the cycle exhausted do not wipe each other's fresh tokens.
async fn restart_if_exhausted(db: &DatabaseConnection) -> Result<bool> {
    let txn = db.begin().await?;
    if next_pair(&txn).await?.is_some() {
        return Ok(false);
    }
    start_new_cycle_in(&txn).await?;
    txn.commit().await?;
    Ok(true)
}

/// Counts consumed and open tokens in the current cycle.
pub async fn cycle_progress(db: &DatabaseConnection) -> Result<CycleProgress> {
    let total = PairingToken::find().count(db).await?;
    let remaining = PairingToken::find()
        .filter(pairing_token::Column::Consumed.eq(false))
        .count(db)
        .await?;

    Ok(CycleProgress {
        total,
        consumed: total - remaining,
        remaining,
    })
}

/// Throws away the current cycle and starts over. Audit records are kept.
pub async fn reset_cycle(db: &DatabaseConnection) -> Result<usize> {
    info!("Resetting audit cycle");
    start_new_cycle(db).await
}
