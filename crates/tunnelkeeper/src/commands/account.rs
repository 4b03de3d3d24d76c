//! Account command handlers.

use std::io::IsTerminal;

use chrono::Utc;
use serde::Serialize;

use tunnelkeeper_core::{AccountData, DeviceState, SetAccountAction};

use super::Context;
use super::util;
use crate::cli::{AccountArgs, AccountCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct AccountView<'a> {
    number: &'a str,
    identifier: &'a str,
    expiry: chrono::DateTime<Utc>,
    expired: bool,
}

impl<'a> From<&'a AccountData> for AccountView<'a> {
    fn from(account: &'a AccountData) -> Self {
        Self {
            number: &account.number,
            identifier: &account.identifier,
            expiry: account.expiry,
            expired: account.is_expired(),
        }
    }
}

fn print_account(account: &AccountData, global: &GlobalOpts) -> Result<(), CliError> {
    let view = AccountView::from(account);
    let out = output::render_single(
        global.output,
        &view,
        |v| {
            output::detail_lines(&[
                ("Account", util::format_account_number(v.number)),
                ("Expiry", util::describe_time(v.expiry, Utc::now())),
                ("Status", if v.expired { "expired" } else { "active" }.into()),
            ])
        },
        |v| v.number.to_owned(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn stored_account(state: &DeviceState) -> Result<&AccountData, CliError> {
    match state {
        DeviceState::LoggedIn(account, _) => Ok(account),
        DeviceState::Revoked => Err(CliError::DeviceRevoked),
        DeviceState::LoggedOut => Err(CliError::NotLoggedIn),
    }
}

fn prompt_account_number(ctx: &Context) -> Result<String, CliError> {
    if !std::io::stdin().is_terminal() {
        return Err(CliError::Validation {
            field: "account number".into(),
            reason: "pass it as an argument when not running interactively".into(),
        });
    }
    let mut input = dialoguer::Input::<String>::new().with_prompt("Account number");
    match ctx.manager.last_used_account() {
        Ok(Some(last)) => input = input.default(last),
        Ok(None) => {}
        Err(e) => tracing::debug!(error = %e, "no last used account"),
    }
    input.interact_text().map_err(util::prompt_err)
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(ctx: &Context, args: AccountArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        AccountCommand::Create => {
            let bar = util::spinner("Creating account", global.quiet);
            let created = ctx.run(ctx.manager.set_account(SetAccountAction::New)).await;
            bar.finish_and_clear();
            match created? {
                Some(account) => print_account(&account, global),
                None => Err(CliError::NotLoggedIn),
            }
        }

        AccountCommand::Login { number } => {
            let number = match number {
                Some(number) => number,
                None => prompt_account_number(ctx)?,
            };
            let number = util::normalize_account_number(&number)?;

            let bar = util::spinner("Logging in", global.quiet);
            let result = ctx
                .run(ctx.manager.set_account(SetAccountAction::Existing(number)))
                .await;
            bar.finish_and_clear();
            match result? {
                Some(account) => print_account(&account, global),
                None => Err(CliError::NotLoggedIn),
            }
        }

        AccountCommand::Logout => {
            if !util::confirm(
                "Log out and remove this device from the account?",
                "account logout",
                global.yes,
            )? {
                return Ok(());
            }
            let bar = util::spinner("Logging out", global.quiet);
            let result = ctx.run(ctx.manager.set_account(SetAccountAction::Unset)).await;
            bar.finish_and_clear();
            result?;
            if !global.quiet {
                eprintln!("Logged out");
            }
            Ok(())
        }

        AccountCommand::Info => {
            let state = ctx.manager.device_state();
            print_account(stored_account(&state)?, global)
        }

        AccountCommand::Refresh => {
            let account = ctx.run(ctx.manager.update_account_data()).await?;
            print_account(&account, global)
        }
    }
}
