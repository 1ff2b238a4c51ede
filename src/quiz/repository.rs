use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use crate::quiz::bank::QuizBank;
use crate::quiz::model::{ExamCode, Question, Quiz};

/// Where a session gets its quiz from.
///
/// `QuizRepository` is the production implementation; tests substitute
/// sources that fail or never answer.
pub trait QuizSource: Send + Sync {
    /// Look up a quiz by the code a student entered
    fn lookup(&self, code: &str) -> impl Future<Output = Result<Option<Quiz>>> + Send;

    /// Produce the question order for one session
    fn shuffle(&self, questions: &[Question]) -> Vec<Question>;
}

/// Shuffle questions with Fisher-Yates, leaving the input untouched.
///
/// Walks from the last index down to 1 and swaps each slot with a uniformly
/// chosen slot in `[0, i]`, so every permutation is equally likely for an
/// unbiased `rng`.
pub fn shuffle_questions<R: Rng + ?Sized>(questions: &[Question], rng: &mut R) -> Vec<Question> {
    let mut shuffled = questions.to_vec();
    for i in (1..shuffled.len()).rev() {
        let j = rng.gen_range(0..=i);
        shuffled.swap(i, j);
    }
    shuffled
}

/// In-memory quiz store, built once at startup and shared by handle
pub struct QuizRepository {
    quizzes: HashMap<ExamCode, Quiz>,
    latency: Duration,
    rng: Mutex<StdRng>,
}

impl QuizRepository {
    /// Create a repository from a list of quizzes
    pub fn new(quizzes: Vec<Quiz>) -> Result<Self> {
        let mut map = HashMap::with_capacity(quizzes.len());
        for quiz in quizzes {
            let code = quiz.exam_code.clone();
            if map.insert(code.clone(), quiz).is_some() {
                anyhow::bail!("Duplicate exam code: {}", code);
            }
        }

        Ok(Self {
            quizzes: map,
            latency: Duration::ZERO,
            rng: Mutex::new(StdRng::from_entropy()),
        })
    }

    /// Create a repository from a loaded quiz bank
    pub fn from_bank(bank: &QuizBank) -> Result<Self> {
        Self::new(bank.quizzes.clone())
    }

    /// Repository seeded with the bundled sample quizzes
    pub fn with_sample_quizzes() -> Result<Self> {
        Self::from_bank(&QuizBank::sample()?)
    }

    /// Delay every lookup, mimicking a remote store
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make the question order reproducible
    pub fn with_shuffle_seed(mut self, seed: Option<u64>) -> Self {
        if let Some(seed) = seed {
            self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        }
        self
    }

    /// Find a quiz without the simulated latency
    pub fn get(&self, code: &str) -> Option<&Quiz> {
        let code = ExamCode::parse(code).ok()?;
        self.quizzes.get(&code)
    }

    /// True iff the code is syntactically valid and names a stored quiz
    pub fn is_valid_code(&self, code: &str) -> bool {
        self.get(code).is_some()
    }

    /// All quizzes, ordered by exam code
    pub fn quizzes(&self) -> Vec<&Quiz> {
        let mut quizzes: Vec<&Quiz> = self.quizzes.values().collect();
        quizzes.sort_by(|a, b| a.exam_code.cmp(&b.exam_code));
        quizzes
    }

    pub fn len(&self) -> usize {
        self.quizzes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quizzes.is_empty()
    }
}

impl QuizSource for QuizRepository {
    async fn lookup(&self, code: &str) -> Result<Option<Quiz>> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let quiz = self.get(code).cloned();
        debug!("Lookup for exam code '{}': {}", code, if quiz.is_some() { "found" } else { "not found" });
        Ok(quiz)
    }

    fn shuffle(&self, questions: &[Question]) -> Vec<Question> {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        shuffle_questions(questions, &mut *rng)
    }
}
