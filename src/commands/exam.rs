use anyhow::{Context, Result};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::commands::utils::{format_countdown, progress_bar};
use crate::quiz::{ExamCode, Question, Quiz, QuizRepository};
use crate::session::{AdvanceOutcome, ExamState, SessionHandle, SessionView};
use crate::settings::SessionSettings;

const CONTROLS_HELP: &str = "Controls: s = start, n = next question, p = pause, r = resume, q = quit";

/// Turns session views into terminal output.
///
/// Questions are printed once when they appear; countdown ticks redraw a
/// single status line.
pub struct ViewRenderer {
    json: bool,
    shown: Option<(ExamState, usize)>,
}

impl ViewRenderer {
    pub fn new(json: bool) -> Self {
        Self { json, shown: None }
    }

    /// Text for one view
    pub fn render(&mut self, view: &SessionView) -> Result<String> {
        if self.json {
            return serde_json::to_string(view).context("Failed to serialize view");
        }

        let key = (view.state, view.current_index);
        let fresh = self.shown != Some(key);
        self.shown = Some(key);

        let text = match view.state {
            ExamState::Loading => format!("Loading exam {}...", view.exam_code),
            ExamState::Failed => format!(
                "Could not load exam {}: {}",
                view.exam_code,
                view.error.as_deref().unwrap_or("unknown error")
            ),
            ExamState::Waiting => describe_waiting(view),
            ExamState::Active if fresh => format!("\n{}\n{}", describe_question(view), status_line(view)),
            ExamState::Active => format!("\r{}", status_line(view)),
            ExamState::Completed => format!(
                "\n\nExam completed! {} answered all {} questions of {}.",
                view.student_name,
                view.total_questions,
                view.quiz_title.as_deref().unwrap_or("the quiz")
            ),
        };

        Ok(text)
    }
}

fn describe_waiting(view: &SessionView) -> String {
    format!(
        "{} ({})\nStudent: {}\n{} questions, {}s each",
        view.quiz_title.as_deref().unwrap_or("Quiz"),
        view.exam_code,
        view.student_name,
        view.total_questions,
        view.time_per_question
    )
}

fn describe_question(view: &SessionView) -> String {
    let mut out = format!("Question {} of {}", view.question_number(), view.total_questions);

    if let Some(question) = &view.current_question {
        if let Some(category) = &question.category {
            out.push_str(&format!(" [{}]", category));
        }
        out.push_str(&format!("\n{}\n", question.question));
        for (i, option) in question.options.iter().enumerate() {
            out.push_str(&format!("  {}) {}\n", Question::option_label(i), option));
        }
    }

    out
}

fn status_line(view: &SessionView) -> String {
    let mut line = format!(
        "{} {}",
        progress_bar(view.time_fraction(), 20),
        format_countdown(view.remaining_time)
    );
    if view.paused {
        line.push_str("  (paused)");
    } else if view.low_time {
        line.push_str("  Hurry up!");
    }
    // Pad so a shorter line fully overwrites the previous one
    format!("{:<40}", line)
}

fn emit(text: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    if text.starts_with('\r') {
        write!(stdout, "{}", text)?;
    } else {
        writeln!(stdout, "{}", text)?;
    }
    stdout.flush().context("Failed to write to terminal")
}

/// Run one operator command; returns false to quit
async fn apply_control(handle: &SessionHandle, command: &str) -> bool {
    let result = match command {
        "" => Ok(()),
        "s" | "start" => handle.start().await,
        "n" | "next" => {
            match handle.force_advance().await {
                AdvanceOutcome::Ignored(reason) => debug!("Next ignored: {:?}", reason),
                outcome => debug!("Next: {:?}", outcome),
            }
            Ok(())
        }
        "p" | "pause" => handle.pause().await,
        "r" | "resume" => handle.resume().await,
        "q" | "quit" => return false,
        _ => {
            eprintln!("{}", CONTROLS_HELP);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}", e);
    }
    true
}

/// Take an exam in the terminal
pub async fn take(
    repo: &QuizRepository,
    code: &str,
    name: &str,
    auto_start: bool,
    json: bool,
    settings: &SessionSettings,
) -> Result<()> {
    let handle = SessionHandle::new(name, code, settings);
    let mut renderer = ViewRenderer::new(json);
    let mut views = handle.subscribe();

    let view = views.borrow_and_update().clone();
    emit(&renderer.render(&view)?)?;

    let loaded = handle.load(repo).await;
    let view = views.borrow_and_update().clone();
    emit(&renderer.render(&view)?)?;
    loaded.with_context(|| format!("Cannot join exam '{}'", code))?;

    if auto_start {
        handle.start().await?;
    } else if !json {
        println!("\n{}", CONTROLS_HELP);
    }

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut input_open = true;

    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                emit(&renderer.render(&view)?)?;
                if view.state.is_terminal() {
                    break;
                }
            }
            line = input.next_line(), if input_open => {
                match line.context("Failed to read from stdin")? {
                    Some(line) => {
                        if !apply_control(&handle, line.trim()).await {
                            break;
                        }
                    }
                    None => {
                        input_open = false;
                        // Nobody left to press start
                        if handle.view().state == ExamState::Waiting {
                            break;
                        }
                    }
                }
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}

/// List quizzes
pub fn list(repo: &QuizRepository) -> Result<()> {
    if repo.is_empty() {
        println!("No quizzes in the bank.");
        return Ok(());
    }

    println!("{:<12} {:<32} {:>9} {:>6}  {}", "CODE", "TITLE", "QUESTIONS", "TIME", "STATUS");
    for quiz in repo.quizzes() {
        println!("{}", list_row(quiz));
    }

    Ok(())
}

fn list_row(quiz: &Quiz) -> String {
    format!(
        "{:<12} {:<32} {:>9} {:>5}s  {}",
        quiz.exam_code.as_str(),
        quiz.title,
        quiz.questions.len(),
        quiz.time_per_question,
        if quiz.is_active { "active" } else { "inactive" }
    )
}

/// Show one quiz with its answer key
pub fn show(repo: &QuizRepository, code: &str) -> Result<()> {
    let code = ExamCode::parse(code)?;
    let quiz = repo
        .get(code.as_str())
        .with_context(|| format!("Quiz not found: {}", code))?;

    print!("{}", describe_quiz(quiz));
    Ok(())
}

fn describe_quiz(quiz: &Quiz) -> String {
    let mut out = format!("{} ({})\n", quiz.title, quiz.exam_code);
    if !quiz.description.is_empty() {
        out.push_str(&format!("{}\n", quiz.description));
    }
    out.push_str(&format!(
        "{} questions, {}s each, {} points, {}\n",
        quiz.questions.len(),
        quiz.time_per_question,
        quiz.total_points(),
        if quiz.is_active { "active" } else { "inactive" }
    ));

    for (n, question) in quiz.questions.iter().enumerate() {
        out.push_str(&format!("\n{}. {}  (id: {}, {} pt)\n", n + 1, question.question, question.id, question.points));
        for (i, option) in question.options.iter().enumerate() {
            let mark = if i == question.correct_answer { "*" } else { " " };
            out.push_str(&format!("  {}{}) {}\n", mark, Question::option_label(i), option));
        }
    }

    out
}
