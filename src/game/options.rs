use rand::Rng;
use serde::{Deserialize, Serialize};

/// How the displayed answer set for a question is built from the pool of
/// distinct correct answers across the whole bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionPolicy {
    /// Correct answer plus `option_count - 1` randomly sampled wrong
    /// answers, shuffled. Falls back to a shorter list when the pool is
    /// too small.
    Sampled,
    /// The full distinct-answer pool, order as given. Ignores
    /// `option_count` entirely.
    Exhaustive,
}

/// Fisher-Yates copy-shuffle. The input slice is left untouched.
pub fn shuffled<T: Clone>(items: &[T], rng: &mut impl Rng) -> Vec<T> {
    let mut out = items.to_vec();
    for i in (1..out.len()).rev() {
        let j = rng.gen_range(0..=i);
        out.swap(i, j);
    }
    out
}

/// Builds the option list for one question. The returned list contains the
/// correct answer exactly once, provided `pool` itself lists it exactly once
/// (it is the distinct-answer pool, so that holds by construction).
pub fn build_options(
    policy: OptionPolicy,
    count: usize,
    correct_answer: &str,
    pool: &[String],
    rng: &mut impl Rng,
) -> Vec<String> {
    match policy {
        OptionPolicy::Exhaustive => pool.to_vec(),
        OptionPolicy::Sampled => {
            let wrong_answers: Vec<String> = pool
                .iter()
                .filter(|answer| answer.as_str() != correct_answer)
                .cloned()
                .collect();

            let mut picked = shuffled(&wrong_answers, rng);
            picked.truncate(count.saturating_sub(1));
            picked.push(correct_answer.to_string());

            shuffled(&picked, rng)
        }
    }
}

/// Index of the correct answer within a generated option list. `None` means
/// the generator broke its own contract; callers turn that into a hard error
/// instead of carrying a sentinel index around.
pub fn correct_index(options: &[String], correct_answer: &str) -> Option<usize> {
    options.iter().position(|option| option == correct_answer)
}
