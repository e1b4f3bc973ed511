//! A simple CLI tool for inspecting a ledger snapshot, as written by the server at shutdown.
//! It prints every vote with its state, options and tally.

use std::fmt::{Display, Formatter};

use clap::{Arg, ArgAction, ArgMatches, Command};

use chainvote_backend::{
    ledger::LedgerSnapshot,
    model::{
        address::Address,
        vote::{OptionContent, Vote},
    },
};

const PROGRAM_NAME: &str = "ledger-cli";

const ABOUT_TEXT: &str = "Print the votes held in a chainvote ledger snapshot.

EXIT CODES:
     0: Success.
     1: The snapshot could not be read, or the requested vote does not exist.";

const SNAPSHOT_PATH: &str = "SNAPSHOT_PATH";

const SNAPSHOT_PATH_HELP: &str = "The path to a ledger snapshot,\n\
as configured by `ledger_snapshot` in Rocket.toml";

const VOTE: &str = "vote";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .arg(
            Arg::new(SNAPSHOT_PATH)
                .help(SNAPSHOT_PATH_HELP)
                .action(ArgAction::Set)
                .required(true),
        )
        .arg(
            Arg::new(VOTE)
                .long(VOTE)
                .help("Only print the vote at this address")
                .value_parser(clap::value_parser!(Address))
                .action(ArgAction::Set),
        )
}

/// One option of a vote with its share of the ballots.
#[derive(Debug, Eq, PartialEq)]
struct OptionSummary {
    id: u32,
    label: String,
    count: u64,
    percentage: u64,
}

impl Display for OptionSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}. {}: {} vote{} ({}%)",
            self.id,
            self.label,
            self.count,
            if self.count != 1 { "s" } else { "" },
            self.percentage
        )
    }
}

/// A friendly summary of one vote.
#[derive(Debug, Eq, PartialEq)]
struct VoteSummary {
    address: Address,
    title: String,
    state: String,
    admin: Address,
    options: Vec<OptionSummary>,
}

impl VoteSummary {
    fn new(vote: &Vote, snapshot: &LedgerSnapshot) -> Self {
        let tally = snapshot.tally(vote);
        let options = vote
            .options
            .iter()
            .map(|option| OptionSummary {
                id: option.id,
                label: match &option.content {
                    OptionContent::RawText(text) => text.clone(),
                    OptionContent::Candidate(candidate) => {
                        match snapshot.accounts().get(candidate) {
                            Some(account) if !account.nickname.is_empty() => {
                                format!("{} ({candidate})", account.nickname)
                            }
                            _ => candidate.to_string(),
                        }
                    }
                },
                count: tally.counts.get(&option.id).copied().unwrap_or(0),
                percentage: tally.percentage(option.id),
            })
            .collect();
        Self {
            address: vote.address,
            title: vote.title.clone(),
            state: vote.state.to_string(),
            admin: vote.admin,
            options,
        }
    }
}

impl Display for VoteSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} \"{}\" [{}], created by {}",
            self.address, self.title, self.state, self.admin
        )?;
        if self.options.is_empty() {
            write!(f, "\n    no options yet")?;
        }
        for option in &self.options {
            write!(f, "\n    {option}")?;
        }
        Ok(())
    }
}

/// Load the snapshot and summarise the requested votes.
fn summarise(path: &str, only: Option<&Address>) -> Result<Vec<VoteSummary>, String> {
    let snapshot = LedgerSnapshot::load(path).map_err(|e| e.to_string())?;
    let summaries = snapshot
        .votes()
        .iter()
        .filter(|vote| only.map_or(true, |address| vote.address == *address))
        .map(|vote| VoteSummary::new(vote, &snapshot))
        .collect::<Vec<_>>();
    match only {
        Some(address) if summaries.is_empty() => Err(format!("No vote at {address}")),
        _ => Ok(summaries),
    }
}

/// Print the summaries and return the exit code.
fn run(args: &ArgMatches) -> u8 {
    let path: &String = args.get_one(SNAPSHOT_PATH).unwrap(); // Required argument is guaranteed to be present.
    let only: Option<&Address> = args.get_one(VOTE);
    match summarise(path, only) {
        Ok(summaries) => {
            println!(
                "{} vote{}",
                summaries.len(),
                if summaries.len() != 1 { "s" } else { "" }
            );
            for summary in summaries {
                println!("{summary}");
            }
            0
        }
        Err(msg) => {
            println!("Error: {msg}");
            1
        }
    }
}

fn main() {
    let args = cli().get_matches();
    let exit_code = run(&args);
    std::process::exit(exit_code.into())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chainvote_backend::{
        ledger::{Event, Ledger, LocalLedger, Transaction},
        model::vote::{OptionType, VoteSpec},
    };

    use super::*;

    fn wallet(n: u8) -> Address {
        Address::from_bytes([n; 20])
    }

    /// Write a snapshot holding one finished vote, and return its path and the vote.
    async fn example_snapshot(name: &str) -> (PathBuf, Address) {
        let root = wallet(1);
        let ledger = LocalLedger::genesis(root, "root@example.com".to_string());
        let spec = VoteSpec {
            title: "Lunch".to_string(),
            description: String::new(),
            option_type: OptionType::PredefinedText,
            need_registration: false,
            candidate_need_approval: false,
            options: vec!["Pizza".to_string(), "Sushi".to_string()],
        };
        let receipt = ledger
            .send(root, Transaction::CreateVote { spec })
            .await
            .unwrap();
        let Event::VoteCreated { vote } = receipt.event else {
            panic!("unexpected event {:?}", receipt.event);
        };
        ledger
            .send(root, Transaction::NextState { vote })
            .await
            .unwrap();
        for (n, option_id) in [(10, 1), (11, 1), (12, 2)] {
            ledger
                .send(wallet(n), Transaction::CastVote { vote, option_id })
                .await
                .unwrap();
        }
        ledger
            .send(root, Transaction::NextState { vote })
            .await
            .unwrap();

        let path = std::env::temp_dir().join(format!(
            "ledger-cli-{name}-{}.json",
            std::process::id()
        ));
        ledger.snapshot().save(&path).unwrap();
        (path, vote)
    }

    #[rocket::async_test]
    async fn summarises_votes() {
        // This test actually enters backend code, so enable logging.
        log4rs_test_utils::test_logging::init_logging_once_for(
            ["chainvote_backend"],
            None,
            None,
        );

        let (path, vote) = example_snapshot("summary").await;
        let summaries = summarise(path.to_str().unwrap(), None).unwrap();
        assert_eq!(
            summaries,
            vec![VoteSummary {
                address: vote,
                title: "Lunch".to_string(),
                state: "Ended".to_string(),
                admin: wallet(1),
                options: vec![
                    OptionSummary {
                        id: 1,
                        label: "Pizza".to_string(),
                        count: 2,
                        percentage: 67,
                    },
                    OptionSummary {
                        id: 2,
                        label: "Sushi".to_string(),
                        count: 1,
                        percentage: 33,
                    },
                ],
            }]
        );
        assert_eq!(
            summaries[0].options[0].to_string(),
            "1. Pizza: 2 votes (67%)"
        );

        assert!(summarise(path.to_str().unwrap(), Some(&wallet(99))).is_err());
        std::fs::remove_file(path).unwrap();
    }

    #[rocket::async_test]
    async fn correct_cli_usage() {
        let (path, vote) = example_snapshot("usage").await;
        let path = path.to_str().unwrap().to_string();

        let command_line = [PROGRAM_NAME, path.as_str()];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 0);

        let vote = vote.to_string();
        let command_line = [PROGRAM_NAME, path.as_str(), "--vote", vote.as_str()];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 0);

        let command_line = [PROGRAM_NAME, "not a real file"];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 1);

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn bad_cli_usage() {
        // Something very wrong.
        let command_line = [PROGRAM_NAME, "this", "invocation", "is", "incorrect"];
        cli().try_get_matches_from(command_line).unwrap_err();

        // No snapshot at all.
        let command_line = [PROGRAM_NAME];
        cli().try_get_matches_from(command_line).unwrap_err();

        // Not an address.
        let command_line = [PROGRAM_NAME, "ledger.json", "--vote", "0x1234"];
        cli().try_get_matches_from(command_line).unwrap_err();
    }
}
