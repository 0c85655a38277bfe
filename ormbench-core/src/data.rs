use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// The operations a virtual client can perform against a target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    CreateUser,
    ListUsers,
    GetUser,
    CreatePost,
    ListPosts,
    GetUserPosts,
    Benchmark,
}

impl Operation {
    pub const ALL: [Operation; 7] = [
        Operation::CreateUser,
        Operation::ListUsers,
        Operation::GetUser,
        Operation::CreatePost,
        Operation::ListPosts,
        Operation::GetUserPosts,
        Operation::Benchmark,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::CreateUser => "create_user",
            Operation::ListUsers => "list_users",
            Operation::GetUser => "get_user",
            Operation::CreatePost => "create_post",
            Operation::ListPosts => "list_posts",
            Operation::GetUserPosts => "get_user_posts",
            Operation::Benchmark => "benchmark",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a single request is classified for load-test purposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    /// A domain collision caused by concurrent clients (duplicate email, missing user). Counted
    /// as a success.
    ExpectedFailure,
    UnexpectedFailure,
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::UnexpectedFailure)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Code(u16),
    /// No response before the request's deadline
    Timeout,
    /// Connection or protocol error
    Transport,
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseStatus::Code(code) => write!(f, "{code}"),
            ResponseStatus::Timeout => f.write_str("timeout"),
            ResponseStatus::Transport => f.write_str("transport error"),
        }
    }
}

/// One observed operation.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestSample {
    pub operation: Operation,
    pub latency: Duration,
    pub outcome: Outcome,
    pub status: ResponseStatus,
}

impl RequestSample {
    pub fn new(
        operation: Operation,
        latency: Duration,
        outcome: Outcome,
        status: ResponseStatus,
    ) -> Self {
        Self {
            operation,
            latency,
            outcome,
            status,
        }
    }
}
