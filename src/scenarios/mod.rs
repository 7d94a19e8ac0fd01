//! Typed scenario steps for the token and topic suites.
//!
//! Every step is an async method on a scenario driver that owns a
//! [`ScenarioState`]. Steps that may legitimately fail take an explicit
//! [`Expectation`].

pub mod expect;
pub mod state;
pub mod token;
pub mod topic;

pub use expect::Expectation;
pub use state::{ActorSlot, ScenarioState};
pub use token::{TokenScenario, TEST_TOKEN_DECIMALS, TEST_TOKEN_NAME, TEST_TOKEN_SYMBOL};
pub use topic::TopicScenario;

use tracing::info;

use crate::error::{HarnessError, Result};
use crate::keys::Actor;
use crate::runtime::ScenarioHarness;

/// Resolve registry account `index`, require a balance above `min_hbars`
/// whole hbars and store it in `slot`.
pub(crate) async fn load_funded_actor(
    harness: &ScenarioHarness,
    state: &mut ScenarioState,
    slot: ActorSlot,
    index: usize,
    min_hbars: i64,
) -> Result<Actor> {
    let actor = harness.registry().nth(index)?.clone();
    let balance = harness.query().balance(actor.account_id).await?;
    if balance.whole_hbars() <= min_hbars {
        return Err(HarnessError::assertion(
            "funded_account",
            format!(
                "{} holds {}, expected more than {} hbar",
                actor.account_id, balance, min_hbars
            ),
        ));
    }
    info!(slot = slot.field(), account_id = %actor.account_id, %balance, "loaded funded account");
    state.set_actor(slot, actor.clone());
    Ok(actor)
}
