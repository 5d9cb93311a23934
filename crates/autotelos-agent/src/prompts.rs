//! Prompt templates
//!
//! Every prompt that expects structured output names the exact JSON shape.
//! Responses are still parsed defensively; see `autotelos_llm::parse_json`.

use autotelos_core::{Attempt, Goal, Principle};

pub fn reflection(domains: &[String], max_candidates: usize) -> String {
    let domains = if domains.is_empty() {
        "any".to_string()
    } else {
        domains.join(", ")
    };
    format!(
        "You are reflecting on your own capabilities.\n\
         Consider what you currently do poorly, what you would like to be able to do, \
         and which concrete skills would most improve your problem solving.\n\n\
         Propose at most {max} improvement goals. Each goal must be something that can \
         be practiced with small, automatically testable programming problems.\n\
         Known domains: {domains}.\n\n\
         Respond with a JSON array only:\n\
         [{{\"description\": \"...\", \"intensity\": 0.0-1.0, \"domain\": \"one of the known domains\"}}]\n\
         \"intensity\" expresses how strongly you want this goal.",
        max = max_candidates,
        domains = domains,
    )
}

pub fn verification(goal: &Goal) -> String {
    format!(
        "Evaluate this self-improvement goal.\n\n\
         Goal: {description}\n\
         Intensity: {intensity:.2}\n\n\
         Score two properties between 0 and 1:\n\
         - actionability: can it be worked on right now with concrete practice?\n\
         - specificity: is it narrow enough that progress is measurable?\n\n\
         Respond with JSON only: {{\"actionability\": 0.0, \"specificity\": 0.0}}",
        description = goal.description,
        intensity = goal.intensity,
    )
}

pub fn problem(goal: &Goal, domain: &str, principles: &[Principle]) -> String {
    let mut prompt = format!(
        "Design one practice problem for the goal below.\n\n\
         Goal: {description}\n\
         Domain: {domain}\n",
        description = goal.description,
        domain = domain,
    );

    if !principles.is_empty() {
        prompt.push_str("\nPrinciples learned so far in this domain:\n");
        for p in principles {
            prompt.push_str(&format!("- {}\n", p.statement));
        }
    }

    prompt.push_str(
        "\nWrite a Python problem with pytest tests. The tests import from `solution`.\n\
         Respond with JSON only:\n\
         {\"description\": \"problem statement\", \"approach\": \"how to solve it\", \
         \"test_code\": \"pytest file contents\", \"starter_code\": \"a complete first solution\"}",
    );
    prompt
}

pub fn repair(description: &str, solution: &str, failure: &str) -> String {
    format!(
        "The solution below fails its tests.\n\n\
         Problem:\n{description}\n\n\
         Current solution:\n```python\n{solution}\n```\n\n\
         Test output:\n```\n{failure}\n```\n\n\
         Reply with the full corrected solution file in a single python code block.",
        description = description,
        solution = solution,
        failure = failure,
    )
}

pub fn extraction(domain: &str, attempts: &[Attempt]) -> String {
    let mut prompt = format!(
        "Below are {n} problems in the \"{domain}\" domain that were solved successfully.\n\n",
        n = attempts.len(),
        domain = domain,
    );
    for (i, a) in attempts.iter().enumerate() {
        prompt.push_str(&format!(
            "{}. Problem: {}\n   Approach: {}\n",
            i + 1,
            a.problem,
            a.approach
        ));
    }
    prompt.push_str(
        "\nExtract ONE general principle that explains what these successes have in common \
         and would help with future problems in this domain. Report your confidence that \
         the principle is correct and general.\n\
         Respond with JSON only: {\"principle\": \"...\", \"confidence\": 0.0}",
    );
    prompt
}
