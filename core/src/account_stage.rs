use crate::{
    error::GenResult,
    event::GenEvent,
    rng::{StageRng, StageSlot},
    stage::{GenContext, GenStage},
    types::Step,
};

/// Materializes account rows into the graph arena and the bank pools.
pub struct AccountStage;

impl AccountStage {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AccountStage {
    fn default() -> Self {
        Self::new()
    }
}

fn draw_step(window: Option<(Step, Step)>, rng: &mut StageRng) -> Option<Step> {
    window.map(|(step, range)| rng.range_inclusive(step, step + range - 1))
}

impl GenStage for AccountStage {
    fn name(&self) -> &'static str {
        "accounts"
    }

    fn slot(&self) -> StageSlot {
        StageSlot::Accounts
    }

    fn run(&mut self, ctx: &mut GenContext, rng: &mut StageRng) -> GenResult<Vec<GenEvent>> {
        let (open_window, close_window) = ctx.config.account_window();
        let default_bank = ctx.config.default.bank_id.clone();

        for row in &ctx.inputs.accounts {
            let bank = row.bank_id.clone().unwrap_or_else(|| default_bank.clone());
            for _ in 0..row.count {
                let balance = rng.uniform(row.min_balance, row.max_balance);
                let open_step = draw_step(open_window, rng);
                let close_step = draw_step(close_window, rng);
                let id = ctx.graph.add_account(
                    bank.clone(),
                    row.country.clone(),
                    row.business_type.clone(),
                    balance,
                    open_step,
                    close_step,
                );
                ctx.registry.register(id, bank.clone());
            }
        }

        let accounts = ctx.graph.num_accounts();
        let banks = ctx.registry.banks().len();
        ctx.summary.accounts = accounts;
        ctx.summary.banks = banks;
        log::info!("accounts: loaded {accounts} accounts across {banks} banks");

        Ok(vec![GenEvent::AccountsLoaded { accounts, banks }])
    }
}
