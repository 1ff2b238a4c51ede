use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// QuickQuest classroom exam display
///
/// Shows a quiz one question at a time, each with its own countdown, and
/// moves on automatically when time runs out.
#[derive(Parser, Debug)]
#[command(name = "quickquest")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Quiz bank file (defaults to the user data directory)
    #[arg(short, long, global = true)]
    pub bank: Option<PathBuf>,

    /// Settings file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    pub settings: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Take an exam
    Take {
        /// Exam code from the instructor
        code: String,

        /// Student name shown on the exam screen
        #[arg(short, long, default_value = "Student")]
        name: String,

        /// Start as soon as the quiz is loaded
        #[arg(long)]
        auto_start: bool,

        /// Use the bundled sample quizzes instead of the bank file
        #[arg(long)]
        sample: bool,

        /// Print every view as a JSON line instead of text
        #[arg(long)]
        json: bool,
    },
    /// List quizzes in the bank
    List {
        /// Use the bundled sample quizzes instead of the bank file
        #[arg(long)]
        sample: bool,
    },
    /// Show a quiz with its answer key
    Show {
        /// Exam code
        code: String,

        /// Use the bundled sample quizzes instead of the bank file
        #[arg(long)]
        sample: bool,
    },
    /// Manage the quiz bank
    Bank {
        #[command(subcommand)]
        command: BankCommands,
    },
    /// Manage the settings file
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommands {
    /// Write a settings file with default values
    Init {
        /// Overwrite an existing settings file
        #[arg(long)]
        force: bool,
    },
    /// Print the settings in effect
    Show,
}

#[derive(Subcommand, Debug)]
pub enum BankCommands {
    /// Create a bank file populated with sample quizzes
    Init {
        /// Overwrite an existing bank
        #[arg(long)]
        force: bool,
    },
    /// Create an empty, inactive quiz
    CreateQuiz {
        #[arg(long)]
        title: String,

        #[arg(long, default_value = "")]
        description: String,

        /// Seconds per question
        #[arg(long)]
        time_per_question: Option<u32>,

        /// Exam code (generated when omitted)
        #[arg(long)]
        code: Option<String>,
    },
    /// Change a quiz's title, description, timing or exam code
    EditQuiz {
        code: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Seconds per question
        #[arg(long)]
        time_per_question: Option<u32>,

        /// Replacement exam code
        #[arg(long)]
        new_code: Option<String>,
    },
    /// Delete a quiz
    DeleteQuiz {
        code: String,
    },
    /// Activate or deactivate a quiz
    Toggle {
        code: String,
    },
    /// Add a question to a quiz
    AddQuestion {
        code: String,

        /// Question prompt
        #[arg(long)]
        question: String,

        /// Answer option (repeat for each option, in order)
        #[arg(long = "option", required = true)]
        options: Vec<String>,

        /// Correct option, counting from 1
        #[arg(long)]
        correct: usize,

        #[arg(long, default_value = "1")]
        points: u32,

        #[arg(long)]
        category: Option<String>,
    },
    /// Change a question; omitted fields keep their current value
    EditQuestion {
        code: String,

        /// Question ID as shown by `quickquest show`
        id: String,

        #[arg(long)]
        question: Option<String>,

        /// Answer option (repeat for each option; replaces all options)
        #[arg(long = "option")]
        options: Vec<String>,

        /// Correct option, counting from 1
        #[arg(long)]
        correct: Option<usize>,

        #[arg(long)]
        points: Option<u32>,

        #[arg(long)]
        category: Option<String>,
    },
    /// Delete a question from a quiz
    DeleteQuestion {
        code: String,

        /// Question ID as shown by `quickquest show`
        id: String,
    },
    /// Append questions from a CSV file
    ImportCsv {
        code: String,

        file: PathBuf,
    },
    /// Print the CSV import template
    Template,
    /// Check the bank file for errors
    Validate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn parse_take() {
        let args = Args::parse_from([
            "quickquest", "take", "12345", "--name", "Ada", "--auto-start", "--sample",
        ]);

        match args.command {
            Commands::Take { code, name, auto_start, sample, json } => {
                assert_eq!(code, "12345");
                assert_eq!(name, "Ada");
                assert!(auto_start);
                assert!(sample);
                assert!(!json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn parse_add_question_with_repeated_options() {
        let args = Args::parse_from([
            "quickquest", "bank", "add-question", "12345",
            "--question", "2 + 2?",
            "--option", "3", "--option", "4",
            "--correct", "2",
        ]);

        match args.command {
            Commands::Bank {
                command: BankCommands::AddQuestion { options, correct, points, .. },
            } => {
                assert_eq!(options, vec!["3", "4"]);
                assert_eq!(correct, 2);
                assert_eq!(points, 1);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn parse_edit_question_without_options() {
        let args = Args::parse_from([
            "quickquest", "bank", "edit-question", "12345", "m1", "--points", "2",
        ]);

        match args.command {
            Commands::Bank {
                command: BankCommands::EditQuestion { id, options, correct, points, .. },
            } => {
                assert_eq!(id, "m1");
                assert!(options.is_empty());
                assert_eq!(correct, None);
                assert_eq!(points, Some(2));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn parse_edit_quiz_and_settings() {
        let args = Args::parse_from(["quickquest", "bank", "edit-quiz", "12345", "--new-code", "alg-1"]);
        assert!(matches!(
            args.command,
            Commands::Bank { command: BankCommands::EditQuiz { new_code: Some(ref c), title: None, .. } } if c == "alg-1"
        ));

        let args = Args::parse_from(["quickquest", "settings", "init", "--force"]);
        assert!(matches!(
            args.command,
            Commands::Settings { command: SettingsCommands::Init { force: true } }
        ));
    }

    #[test]
    fn global_bank_path_after_subcommand() {
        let args = Args::parse_from(["quickquest", "list", "--bank", "/tmp/bank.yaml"]);
        assert_eq!(args.bank, Some(PathBuf::from("/tmp/bank.yaml")));
    }
}
