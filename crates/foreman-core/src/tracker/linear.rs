use super::TaskSource;
use crate::error::{ForemanError, Result};
use crate::task::{TaskRecord, TaskState};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const PAGE_SIZE: u32 = 50;
/// Upper bound on pages fetched per listing.
const MAX_PAGES: usize = 20;

const PENDING_QUERY: &str = r#"
query PendingIssues($filter: IssueFilter!, $first: Int!, $after: String, $orderBy: PaginationOrderBy) {
  issues(filter: $filter, first: $first, after: $after, orderBy: $orderBy) {
    pageInfo { hasNextPage endCursor }
    nodes {
      id
      identifier
      title
      description
      createdAt
      state { id name }
    }
  }
}
"#;

const UPDATE_STATE_MUTATION: &str = r#"
mutation MoveIssue($id: String!, $stateId: String!) {
  issueUpdate(id: $id, input: { stateId: $stateId }) {
    success
  }
}
"#;

const COMMENT_MUTATION: &str = r#"
mutation CommentOnIssue($issueId: String!, $body: String!) {
  commentCreate(input: { issueId: $issueId, body: $body }) {
    success
  }
}
"#;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LinearSettings {
    pub api_url: String,
    pub api_key: String,
    pub team_id: String,
    pub state_todo_id: String,
    pub state_in_progress_id: String,
    pub state_in_review_id: String,
    pub state_done_id: String,
    /// Only pick issues carrying this label.
    pub label_id: Option<String>,
    /// Only pick issues in this project.
    pub project_id: Option<String>,
}

impl LinearSettings {
    pub fn from_env(api_url: &str) -> Result<Self> {
        Self::from_lookup(api_url, |k| std::env::var(k).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(api_url: &str, get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |k: &str| {
            get(k)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ForemanError::MissingEnv(k.to_string()))
        };
        let optional = |k: &str| get(k).filter(|v| !v.trim().is_empty());
        Ok(Self {
            api_url: api_url.to_string(),
            api_key: required("LINEAR_API_KEY")?,
            team_id: required("LINEAR_TEAM_ID")?,
            state_todo_id: required("LINEAR_STATE_TODO_ID")?,
            state_in_progress_id: required("LINEAR_STATE_IN_PROGRESS_ID")?,
            state_in_review_id: required("LINEAR_STATE_IN_REVIEW_ID")?,
            state_done_id: required("LINEAR_STATE_DONE_ID")?,
            label_id: optional("LINEAR_LABEL_CLAUDE_ID"),
            project_id: optional("LINEAR_PROJECT_MERCURY_ID"),
        })
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
struct IssuePage {
    #[serde(default, rename = "pageInfo")]
    page_info: PageInfo,
    nodes: Vec<IssueNode>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    #[serde(default)]
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueNode {
    id: String,
    identifier: String,
    title: String,
    #[serde(default)]
    description: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// LinearClient
// ---------------------------------------------------------------------------

pub struct LinearClient {
    settings: LinearSettings,
}

impl LinearClient {
    pub fn new(settings: LinearSettings) -> Self {
        Self { settings }
    }

    fn query(&self, query: &str, variables: Value) -> Result<Value> {
        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()?;
        let resp = client
            .post(&self.settings.api_url)
            .header("Authorization", &self.settings.api_key)
            .json(&json!({ "query": query, "variables": variables }))
            .send()?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(ForemanError::Http(format!("linear returned {status}: {body}")));
        }
        let parsed: GraphQlResponse = resp.json()?;
        if !parsed.errors.is_empty() {
            let messages: Vec<String> = parsed.errors.into_iter().map(|e| e.message).collect();
            return Err(ForemanError::GraphQl(messages.join("; ")));
        }
        parsed
            .data
            .ok_or_else(|| ForemanError::GraphQl("response had no data".into()))
    }

    fn pending_filter(&self) -> Value {
        let s = &self.settings;
        let mut filter = json!({
            "team": { "id": { "eq": s.team_id } },
            "state": { "id": { "eq": s.state_todo_id } },
        });
        if let Some(label) = &s.label_id {
            filter["labels"] = json!({ "some": { "id": { "eq": label } } });
        }
        if let Some(project) = &s.project_id {
            filter["project"] = json!({ "id": { "eq": project } });
        }
        filter
    }

    fn move_to(&self, task: &TaskRecord, state_id: &str) -> Result<()> {
        let data = self.query(
            UPDATE_STATE_MUTATION,
            json!({ "id": task.id, "stateId": state_id }),
        )?;
        expect_success(&data, "issueUpdate")
    }

    fn comment(&self, task: &TaskRecord, body: &str) -> Result<()> {
        let data = self.query(COMMENT_MUTATION, json!({ "issueId": task.id, "body": body }))?;
        expect_success(&data, "commentCreate")
    }
}

fn expect_success(data: &Value, field: &str) -> Result<()> {
    if data[field]["success"].as_bool() == Some(true) {
        Ok(())
    } else {
        Err(ForemanError::GraphQl(format!("{field} did not succeed")))
    }
}

impl TaskSource for LinearClient {
    fn name(&self) -> &str {
        "linear"
    }

    fn list_pending(&self) -> Result<Vec<TaskRecord>> {
        let filter = self.pending_filter();
        let mut nodes: Vec<IssueNode> = Vec::new();
        let mut after: Option<String> = None;
        for _ in 0..MAX_PAGES {
            let data = self.query(
                PENDING_QUERY,
                json!({
                    "filter": filter,
                    "first": PAGE_SIZE,
                    "after": after,
                    "orderBy": "createdAt",
                }),
            )?;
            let page: IssuePage = serde_json::from_value(data["issues"].clone())?;
            nodes.extend(page.nodes);
            match page.page_info.end_cursor {
                Some(cursor) if page.page_info.has_next_page => after = Some(cursor),
                _ => break,
            }
        }
        // Linear orders createdAt newest first; the loop wants oldest first.
        let mut tasks: Vec<TaskRecord> = nodes
            .into_iter()
            .map(|n| TaskRecord {
                id: n.id,
                key: n.identifier,
                title: n.title,
                description: n.description.unwrap_or_default(),
                created_at: n.created_at,
                state: TaskState::Open,
            })
            .collect();
        tasks.sort_by_key(|t| t.created_at);
        tracing::info!(count = tasks.len(), "linear issues pending");
        Ok(tasks)
    }

    fn mark_in_progress(&self, task: &TaskRecord) -> Result<()> {
        self.move_to(task, &self.settings.state_in_progress_id)
    }

    fn mark_in_review(&self, task: &TaskRecord, pr_url: &str) -> Result<()> {
        self.move_to(task, &self.settings.state_in_review_id)?;
        self.comment(task, &format!("PR created: {pr_url}\n\nReady for review."))
    }

    fn close(&self, task: &TaskRecord, note: &str) -> Result<()> {
        self.move_to(task, &self.settings.state_done_id)?;
        self.comment(task, note)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
