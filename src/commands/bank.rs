use anyhow::{Context, Result};
use std::path::Path;

use crate::cli::BankCommands;
use crate::quiz::bank::{
    EXAMPLE_BANK, NewQuiz, QuestionUpdate, QuizBank, QuizUpdate, load_bank, save_bank,
};
use crate::quiz::import::{CSV_TEMPLATE, parse_questions_csv};
use crate::quiz::Question;

/// Run a bank subcommand against the bank file
pub fn run_bank_command(command: BankCommands, bank_path: &Path) -> Result<()> {
    match command {
        BankCommands::Init { force } => init(bank_path, force),
        BankCommands::CreateQuiz {
            title,
            description,
            time_per_question,
            code,
        } => create_quiz(
            bank_path,
            NewQuiz {
                title,
                description,
                time_per_question,
                exam_code: code,
            },
        ),
        BankCommands::EditQuiz {
            code,
            title,
            description,
            time_per_question,
            new_code,
        } => edit_quiz(
            bank_path,
            &code,
            QuizUpdate {
                title,
                description,
                time_per_question,
                exam_code: new_code,
            },
        ),
        BankCommands::DeleteQuiz { code } => delete_quiz(bank_path, &code),
        BankCommands::Toggle { code } => toggle(bank_path, &code),
        BankCommands::AddQuestion {
            code,
            question,
            options,
            correct,
            points,
            category,
        } => {
            let correct_answer = correct
                .checked_sub(1)
                .context("--correct counts from 1")?;
            add_question(
                bank_path,
                &code,
                Question {
                    id: String::new(),
                    question,
                    options,
                    correct_answer,
                    points,
                    category,
                },
            )
        }
        BankCommands::EditQuestion {
            code,
            id,
            question,
            options,
            correct,
            points,
            category,
        } => {
            let correct_answer = correct
                .map(|c| c.checked_sub(1).context("--correct counts from 1"))
                .transpose()?;
            edit_question(
                bank_path,
                &code,
                &id,
                QuestionUpdate {
                    question,
                    options: Some(options).filter(|o| !o.is_empty()),
                    correct_answer,
                    points,
                    category,
                },
            )
        }
        BankCommands::DeleteQuestion { code, id } => delete_question(bank_path, &code, &id),
        BankCommands::ImportCsv { code, file } => import_csv(bank_path, &code, &file),
        BankCommands::Template => {
            print!("{}", CSV_TEMPLATE);
            Ok(())
        }
        BankCommands::Validate => validate(bank_path),
    }
}

/// Write the sample bank to disk
pub fn init(bank_path: &Path, force: bool) -> Result<()> {
    if bank_path.exists() && !force {
        anyhow::bail!(
            "Quiz bank already exists: {}\nUse --force to overwrite",
            bank_path.display()
        );
    }

    let bank = QuizBank::from_yaml_str(EXAMPLE_BANK).context("Bundled sample bank is invalid")?;
    save_bank(bank_path, &bank)?;

    println!("✓ Created quiz bank: {}", bank_path.display());
    println!("  {} sample quizzes: {}", bank.quizzes.len(), codes(&bank));
    println!("\nTry it: quickquest take 12345 --name \"Your Name\"");

    Ok(())
}

fn codes(bank: &QuizBank) -> String {
    bank.quizzes
        .iter()
        .map(|q| q.exam_code.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load, change, save
fn modify<T>(bank_path: &Path, change: impl FnOnce(&mut QuizBank) -> Result<T>) -> Result<T> {
    let mut bank = load_bank(bank_path)?;
    let result = change(&mut bank)?;
    save_bank(bank_path, &bank)?;
    Ok(result)
}

pub fn create_quiz(bank_path: &Path, new: NewQuiz) -> Result<()> {
    let (title, code) = modify(bank_path, |bank| {
        let quiz = bank.create_quiz(new)?;
        Ok((quiz.title.clone(), quiz.exam_code.clone()))
    })?;

    println!("✓ Created quiz: {} (exam code {})", title, code);
    println!("  The quiz starts inactive. Add questions, then run:");
    println!("  quickquest bank toggle {}", code);
    Ok(())
}

pub fn edit_quiz(bank_path: &Path, code: &str, update: QuizUpdate) -> Result<()> {
    let new_code = modify(bank_path, |bank| bank.update_quiz(code, update))?;
    println!("✓ Updated quiz {}", new_code);
    Ok(())
}

pub fn delete_quiz(bank_path: &Path, code: &str) -> Result<()> {
    let removed = modify(bank_path, |bank| bank.delete_quiz(code))?;
    println!("✓ Deleted quiz: {} ({})", removed.title, removed.exam_code);
    Ok(())
}

pub fn toggle(bank_path: &Path, code: &str) -> Result<()> {
    let active = modify(bank_path, |bank| bank.toggle_active(code))?;
    println!(
        "✓ Quiz {} is now {}",
        code,
        if active { "active" } else { "inactive" }
    );
    Ok(())
}

pub fn add_question(bank_path: &Path, code: &str, question: Question) -> Result<()> {
    let id = modify(bank_path, |bank| bank.add_question(code, question))?;
    println!("✓ Added question {} to {}", id, code);
    Ok(())
}

pub fn edit_question(bank_path: &Path, code: &str, id: &str, update: QuestionUpdate) -> Result<()> {
    modify(bank_path, |bank| bank.edit_question(code, id, update))?;
    println!("✓ Updated question {} in {}", id, code);
    Ok(())
}

pub fn delete_question(bank_path: &Path, code: &str, id: &str) -> Result<()> {
    modify(bank_path, |bank| bank.delete_question(code, id))?;
    println!("✓ Deleted question {} from {}", id, code);
    Ok(())
}

/// Append the valid rows of a CSV file, reporting the rest
pub fn import_csv(bank_path: &Path, code: &str, file: &Path) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read CSV file: {}", file.display()))?;

    let import = parse_questions_csv(&text);
    for rejected in &import.rejected {
        eprintln!("  Skipped line {}: {}", rejected.line, rejected.reason);
    }

    if import.questions.is_empty() {
        anyhow::bail!("No valid questions found in {}", file.display());
    }

    let added = modify(bank_path, |bank| bank.append_questions(code, import.questions))?;
    println!(
        "✓ Imported {} questions into {} ({} rows skipped)",
        added,
        code,
        import.rejected.len()
    );
    Ok(())
}

pub fn validate(bank_path: &Path) -> Result<()> {
    let bank = load_bank(bank_path)?;
    let questions: usize = bank.quizzes.iter().map(|q| q.questions.len()).sum();

    println!("✓ Quiz bank is valid: {}", bank_path.display());
    println!("  {} quizzes, {} questions", bank.quizzes.len(), questions);
    Ok(())
}
