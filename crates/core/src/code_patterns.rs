//! Static catalog of implementation patterns used to ground code-based curricula.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternLevel {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Copy)]
pub struct CodePattern {
    pub level: PatternLevel,
    pub name: &'static str,
    pub description: &'static str,
    pub source: &'static str,
}

pub const CATALOG: &[CodePattern] = &[
    CodePattern {
        level: PatternLevel::Beginner,
        name: "HTTP server skeleton",
        description: "Environment loading, JSON body parsing, static files and middleware wiring",
        source: "server bootstrap",
    },
    CodePattern {
        level: PatternLevel::Beginner,
        name: "PIN authentication middleware",
        description: "Read a PIN from a header or body, compare against configuration, reject with 401",
        source: "server middleware",
    },
    CodePattern {
        level: PatternLevel::Beginner,
        name: "External API call",
        description: "Call a remote endpoint, check the status, parse JSON and surface errors",
        source: "api client",
    },
    CodePattern {
        level: PatternLevel::Beginner,
        name: "LLM service wrapper",
        description: "Initialise a model client once and expose generate and chat functions",
        source: "llm service",
    },
    CodePattern {
        level: PatternLevel::Beginner,
        name: "Single-prompt agent",
        description: "A fixed system prompt plus one generate call behind a small function",
        source: "agents",
    },
    CodePattern {
        level: PatternLevel::Intermediate,
        name: "LLM wrapper with retry and timeout",
        description: "Bound each call with a timeout and retry transient failures with backoff",
        source: "shared llm library",
    },
    CodePattern {
        level: PatternLevel::Intermediate,
        name: "Embedded SQL store",
        description: "Lazily opened database in WAL mode with schema creation and CRUD helpers",
        source: "store",
    },
    CodePattern {
        level: PatternLevel::Intermediate,
        name: "Health check endpoint",
        description: "Report status, uptime and memory so supervisors can probe the service",
        source: "server base",
    },
    CodePattern {
        level: PatternLevel::Intermediate,
        name: "Chat bot long polling",
        description: "Poll a messaging API for updates and dispatch commands to handlers",
        source: "bot agent",
    },
    CodePattern {
        level: PatternLevel::Advanced,
        name: "Circuit breaker",
        description: "Open after repeated failures, fail fast, then probe with a half-open state",
        source: "resilience library",
    },
    CodePattern {
        level: PatternLevel::Advanced,
        name: "Event bus",
        description: "Publish and subscribe between agents without direct coupling",
        source: "orchestrator",
    },
    CodePattern {
        level: PatternLevel::Advanced,
        name: "Prompt A/B testing",
        description: "Deterministically assign weighted prompt variants and compare outcomes",
        source: "experiments",
    },
    CodePattern {
        level: PatternLevel::Advanced,
        name: "Workflow checkpoint and resume",
        description: "Persist step results so a long workflow restarts from the last good step",
        source: "workflow engine",
    },
    CodePattern {
        level: PatternLevel::Advanced,
        name: "Metrics collection",
        description: "Count requests and time handlers, exposed for scraping",
        source: "observability",
    },
];

pub fn by_level(level: PatternLevel) -> impl Iterator<Item = &'static CodePattern> {
    CATALOG.iter().filter(move |p| p.level == level)
}
