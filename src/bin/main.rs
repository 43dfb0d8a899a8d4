// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use anyhow::{Context, bail};
use bankcards_ledger::{
    Bank, BankError, BlockRequest, Card, CardNumber, CardStatus, PageRequest, RequestId, Settings,
    User, UserId, YearMonth,
};
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Bankcards - replay card operations against an in-memory ledger
///
/// Seeds cards from a CSV file, replays an operations CSV against them and
/// prints the resulting cards to stdout.
#[derive(Parser, Debug)]
#[command(name = "bankcards")]
#[command(about = "Replays card operations against an in-memory card ledger", long_about = None)]
struct Args {
    /// Cards to seed
    ///
    /// Expected format: number,login,expiration,status,balance
    #[arg(long, value_name = "FILE")]
    cards: PathBuf,

    /// Operations to replay
    ///
    /// Expected format: op,card,target,amount,user,request,reason,expiration,page,status
    #[arg(long, value_name = "FILE")]
    ops: Option<PathBuf>,
}

/// Password hash given to holders created while seeding; matches no password.
const SEEDED_PASSWORD_HASH: &str = "!";
const DEFAULT_BLOCK_REASON: &str = "User requested card block";

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays CSV.
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bankcards=info,bankcards_ledger=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let settings = Settings::from_env().context("loading settings")?;
    let bank = Bank::new();

    let file = File::open(&args.cards)
        .with_context(|| format!("opening cards file '{}'", args.cards.display()))?;
    let seeded = seed_cards(&bank, BufReader::new(file))?;
    tracing::info!(cards = seeded, holders = bank.holders().len(), "ledger seeded");

    let scheduler = settings
        .sweeper
        .enabled
        .then(|| bank.start_sweeper(settings.sweeper.cadence()));

    if let Some(path) = &args.ops {
        let file = File::open(path)
            .with_context(|| format!("opening operations file '{}'", path.display()))?;
        let applied = replay_operations(&bank, settings.page_size, BufReader::new(file))?;
        tracing::info!(applied, "operations replayed");
    }

    if let Some(scheduler) = scheduler {
        scheduler.shutdown();
    }

    write_cards(&bank, std::io::stdout()).context("writing cards")?;
    Ok(())
}

/// Card snapshot row: `number, login, expiration, status, balance`.
#[derive(Debug, Deserialize)]
struct CardRecord {
    number: String,
    login: String,
    expiration: String,
    status: String,
    balance: Decimal,
}

/// Seeds cards, registering each owner login the first time it appears.
///
/// Invalid rows are logged and skipped. Returns the number of cards stored.
fn seed_cards<R: Read>(bank: &Bank, reader: R) -> anyhow::Result<usize> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .has_headers(true)
        .from_reader(reader);
    let mut owners: HashMap<String, UserId> = HashMap::new();
    let mut seeded = 0;

    for (line, result) in rdr.deserialize::<CardRecord>().enumerate() {
        let outcome = result
            .map_err(anyhow::Error::from)
            .and_then(|record| seed_card(bank, &mut owners, record));
        match outcome {
            Ok(()) => seeded += 1,
            Err(error) => tracing::warn!(row = line + 1, %error, "skipping card row"),
        }
    }
    Ok(seeded)
}

fn seed_card(
    bank: &Bank,
    owners: &mut HashMap<String, UserId>,
    record: CardRecord,
) -> anyhow::Result<()> {
    let number = CardNumber::parse(&record.number)?;
    let expiration: YearMonth = record.expiration.parse()?;
    let status: CardStatus = record.status.parse()?;
    // Reject the row before its owner gets registered.
    Card::check_balance(record.balance)?;
    if bank.cards().contains(&number) {
        return Err(BankError::DuplicateCard(number).into());
    }
    let owner = match owners.get(&record.login) {
        Some(owner) => *owner,
        None => {
            let owner = bank
                .holders()
                .register(&record.login, SEEDED_PASSWORD_HASH, &[])?;
            owners.insert(record.login, owner);
            owner
        }
    };
    bank.cards()
        .insert(Card::restore(number, expiration, owner, status, record.balance)?)?;
    Ok(())
}

/// Operation row: `op, card, target, amount, user, request, reason,
/// expiration, page, status`.
///
/// Only the columns an operation needs have to be filled in; trailing
/// columns may be left out entirely.
#[derive(Debug, Deserialize)]
struct OperationRecord {
    op: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    card: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    target: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    amount: Option<Decimal>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    user: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    request: Option<u64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    reason: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    expiration: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    page: Option<usize>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    status: Option<String>,
}

impl OperationRecord {
    fn card(&self) -> anyhow::Result<CardNumber> {
        let card = self.card.as_deref().context("missing card")?;
        Ok(CardNumber::parse(card)?)
    }

    fn target(&self) -> anyhow::Result<CardNumber> {
        let target = self.target.as_deref().context("missing target card")?;
        Ok(CardNumber::parse(target)?)
    }

    fn request(&self) -> anyhow::Result<RequestId> {
        self.request.map(RequestId).context("missing request id")
    }

    fn user(&self, bank: &Bank) -> anyhow::Result<User> {
        let login = self.user.as_deref().context("missing user")?;
        bank.holders()
            .find_by_login(login)
            .with_context(|| format!("unknown user '{login}'"))
    }

    fn expiration(&self) -> anyhow::Result<YearMonth> {
        let expiration = self.expiration.as_deref().context("missing expiration")?;
        Ok(expiration.parse()?)
    }

    /// Page named by the row, sized by configuration.
    fn page(&self, page_size: usize) -> PageRequest {
        PageRequest::new(self.page.unwrap_or(0), page_size)
    }
}

/// Replays operations in file order.
///
/// Failing operations are logged and skipped. Returns how many succeeded.
fn replay_operations<R: Read>(bank: &Bank, page_size: usize, reader: R) -> anyhow::Result<usize> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);
    let mut applied = 0;

    for (line, result) in rdr.deserialize::<OperationRecord>().enumerate() {
        let outcome = result
            .map_err(anyhow::Error::from)
            .and_then(|record| apply_operation(bank, page_size, &record));
        match outcome {
            Ok(()) => applied += 1,
            Err(error) => tracing::warn!(row = line + 1, %error, "skipping operation"),
        }
    }
    Ok(applied)
}

fn apply_operation(bank: &Bank, page_size: usize, record: &OperationRecord) -> anyhow::Result<()> {
    match record.op.to_lowercase().as_str() {
        "issue" => {
            let owner = record.user(bank)?;
            bank.lifecycle()
                .issue(record.card()?, record.expiration()?, owner.id())?;
        }
        "transfer" => {
            let amount = record.amount.context("missing amount")?;
            bank.transfers()
                .transfer(&record.card()?, &record.target()?, amount)?;
        }
        "block" => {
            bank.lifecycle().block(&record.card()?)?;
        }
        "activate" => {
            bank.lifecycle().activate(&record.card()?)?;
        }
        "delete" => {
            bank.lifecycle().delete(&record.card()?)?;
        }
        "request" => {
            let requester = record.user(bank)?;
            let reason = record.reason.as_deref().unwrap_or(DEFAULT_BLOCK_REASON);
            let request = bank
                .workflow()
                .submit(&record.card()?, requester.id(), reason)?;
            tracing::info!(request = %request.id(), "request filed");
        }
        "approve" => {
            bank.workflow().approve(record.request()?)?;
        }
        "reject" => {
            bank.workflow().reject(record.request()?)?;
        }
        "sweep" => {
            bank.sweeper().sweep();
        }
        "list" => {
            let page = record.page(page_size);
            let cards = list_cards(bank, page);
            tracing::info!(page = page.page, size = page.size, cards = cards.len(), "card page");
            for card in &cards {
                tracing::info!(
                    card = %card.number(),
                    owner = %card.owner(),
                    status = %card.status(),
                    balance = %card.balance(),
                    "card"
                );
            }
        }
        "requests" => {
            let page = record.page(page_size);
            let requests = list_requests(bank, record.status.as_deref(), page)?;
            tracing::info!(
                page = page.page,
                size = page.size,
                requests = requests.len(),
                "block request page"
            );
            for request in &requests {
                tracing::info!(
                    request = %request.id(),
                    card = %request.card_number(),
                    status = %request.status(),
                    "block request"
                );
            }
        }
        other => bail!("unknown operation '{other}'"),
    }
    Ok(())
}

fn list_cards(bank: &Bank, page: PageRequest) -> Vec<Card> {
    bank.lifecycle().list(page)
}

/// Requests newest first, optionally restricted to one status.
fn list_requests(
    bank: &Bank,
    status: Option<&str>,
    page: PageRequest,
) -> Result<Vec<BlockRequest>, BankError> {
    match status {
        Some(status) => bank.workflow().list_by_status(status, page),
        None => Ok(bank.workflow().list(page)),
    }
}

/// Writes every card, ordered by number, as CSV.
///
/// # CSV Format
///
/// Columns: `number, owner, expiration, status, balance`
///
/// ```csv
/// number,owner,expiration,status,balance
/// 1111222233334444,1,2030-01,ACTIVE,150.00
/// ```
fn write_cards<W: Write>(bank: &Bank, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    for card in bank.cards().all() {
        wtr.serialize(&card)?;
    }
    wtr.flush()?;
    Ok(())
}
