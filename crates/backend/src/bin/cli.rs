use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use smart_todo_types::{
    CreateTaskRequest, MagicLinkRequest, MagicLinkResponse, SortOrder, Task, TaskPriority,
    TaskSort, TaskStats, TaskStatus, UpdateSettingsRequest, UpdateStatusRequest,
    UpdateTaskRequest, UserSettings,
};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "smart-todo")]
#[command(about = "CLI for managing tasks and settings via the Smart To-Do API")]
#[command(
    long_about = "A command-line interface for the Smart To-Do server.\n\n\
    Sign in with 'login <email>', open the emailed link, then pass the session\n\
    token with --token (or SMART_TODO_TOKEN) to manage tasks and settings."
)]
struct Cli {
    /// Backend server URL to connect to.
    #[arg(
        short,
        long,
        default_value = "http://localhost:3000",
        env = "SMART_TODO_API_URL"
    )]
    base_url: String,

    /// Session token, sent as a bearer token.
    #[arg(long, env = "SMART_TODO_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage tasks - create, list, update, delete, and change status
    Tasks {
        #[command(subcommand)]
        action: TaskAction,
    },
    /// Show or change notification and calendar settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Request a sign-in link by email
    Login {
        /// Address to send the link to
        email: String,
    },
}

#[derive(Subcommand)]
enum TaskAction {
    /// List tasks, newest first unless sorted otherwise
    ///
    /// Displays each task with a status marker (○ pending, ◐ in progress,
    /// ✓ completed), its short ID, priority, title and due date.
    List {
        /// Only show tasks with this status (pending, in-progress, completed)
        #[arg(short, long)]
        status: Option<TaskStatus>,

        /// Only show tasks with this priority (low, medium, high)
        #[arg(short, long)]
        priority: Option<TaskPriority>,

        /// Sort key: created, due or priority
        #[arg(long, default_value = "created")]
        sort: TaskSort,

        /// Sort order: asc or desc
        #[arg(long, default_value = "desc")]
        order: SortOrder,
    },

    /// Show every field of a single task
    Show { id: Uuid },

    /// Create a new task
    Create {
        /// The title of the task (at most 200 characters)
        title: String,

        /// Longer notes about the task
        #[arg(short, long, value_name = "TEXT")]
        description: Option<String>,

        /// Due date, as YYYY-MM-DD or an RFC 3339 timestamp
        #[arg(long, value_name = "DATE", value_parser = parse_due)]
        due: Option<DateTime<Utc>>,

        #[arg(short, long)]
        priority: Option<TaskPriority>,

        /// Initial status (defaults to pending)
        #[arg(short, long)]
        status: Option<TaskStatus>,
    },

    /// Update an existing task's fields
    ///
    /// Only specified fields are changed. Pass an empty string to
    /// --description or --due to clear it.
    Update {
        id: Uuid,

        #[arg(short, long, value_name = "TEXT")]
        title: Option<String>,

        #[arg(short, long, value_name = "TEXT")]
        description: Option<String>,

        #[arg(long, value_name = "DATE")]
        due: Option<String>,

        #[arg(short, long)]
        priority: Option<TaskPriority>,

        #[arg(short, long)]
        status: Option<TaskStatus>,
    },

    /// Set the status of a task
    Status { id: Uuid, status: TaskStatus },

    /// Mark a task as completed
    Done { id: Uuid },

    /// Reopen a completed task, restoring its previous status
    Undo { id: Uuid },

    /// Permanently delete a task
    ///
    /// Also removes the task's calendar event, if it has one.
    Delete { id: Uuid },

    /// Show task counts by status
    Stats,
}

#[derive(Subcommand)]
enum SettingsAction {
    Show,
    Set {
        #[arg(long, value_name = "BOOL")]
        email_notifications: Option<bool>,

        /// Requires a connected Google Calendar
        #[arg(long, value_name = "BOOL")]
        calendar_sync: Option<bool>,
    },
}

fn parse_due(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(9, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("invalid date '{}', expected YYYY-MM-DD or RFC 3339", value))
}

struct Api {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl Api {
    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url.trim_end_matches('/'), path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> anyhow::Result<T> {
        let response = check(builder.send().await.context("Request failed")?).await?;
        response.json().await.context("Invalid response body")
    }
}

async fn check(response: Response) -> anyhow::Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body: serde_json::Value = response.json().await.unwrap_or_default();
    let message = body["error"].as_str().unwrap_or("request failed");
    anyhow::bail!("{} ({})", message, status)
}

fn status_marker(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "○",
        TaskStatus::InProgress => "◐",
        TaskStatus::Completed => "✓",
    }
}

fn short_id(id: Uuid) -> String {
    id.to_string()[..8].to_string()
}

fn print_task_line(task: &Task) {
    let due = task
        .due_date
        .map(|d| format!("  due {}", d.format("%Y-%m-%d %H:%M")))
        .unwrap_or_default();
    println!(
        "{} [{}] ({}) {}{}",
        status_marker(task.status),
        short_id(task.id),
        task.priority.label(),
        task.title,
        due
    );
}

fn print_task(task: &Task) {
    println!("{} {}", status_marker(task.status), task.title);
    println!("    ID:       {}", task.id);
    println!("    Status:   {}", task.status.label());
    println!("    Priority: {}", task.priority.label());
    if let Some(desc) = &task.description {
        println!("    Notes:    {}", desc);
    }
    if let Some(due) = task.due_date {
        println!("    Due:      {}", due.to_rfc3339());
    }
    if let Some(done) = task.completed_at {
        println!("    Done at:  {}", done.to_rfc3339());
    }
    if task.calendar_event_id.is_some() {
        println!("    Calendar: synced");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let api = Api {
        client: Client::new(),
        base_url: cli.base_url,
        token: cli.token,
    };

    match cli.command {
        Commands::Tasks { action } => handle_tasks(&api, action).await?,
        Commands::Settings { action } => handle_settings(&api, action).await?,
        Commands::Login { email } => {
            let req = MagicLinkRequest { email };
            let res: MagicLinkResponse = api
                .send(api.request(reqwest::Method::POST, "/api/auth/magic-link").json(&req))
                .await?;
            println!("{}", res.message);
        }
    }

    Ok(())
}

async fn handle_tasks(api: &Api, action: TaskAction) -> anyhow::Result<()> {
    use reqwest::Method;

    match action {
        TaskAction::List {
            status,
            priority,
            sort,
            order,
        } => {
            let mut query = vec![
                ("sort", sort.as_str().to_string()),
                ("order", order.as_str().to_string()),
            ];
            if let Some(status) = status {
                query.push(("status", status.as_str().to_string()));
            }
            if let Some(priority) = priority {
                query.push(("priority", priority.as_str().to_string()));
            }

            let tasks: Vec<Task> = api
                .send(api.request(Method::GET, "/api/tasks").query(&query))
                .await?;
            if tasks.is_empty() {
                println!("No tasks found.");
            } else {
                tasks.iter().for_each(print_task_line);
            }
        }
        TaskAction::Show { id } => {
            let task: Task = api
                .send(api.request(Method::GET, &format!("/api/tasks/{}", id)))
                .await?;
            print_task(&task);
        }
        TaskAction::Create {
            title,
            description,
            due,
            priority,
            status,
        } => {
            let req = CreateTaskRequest {
                title,
                description,
                due_date: due,
                priority,
                status,
            };
            let task: Task = api
                .send(api.request(Method::POST, "/api/tasks").json(&req))
                .await?;
            println!("Created task: [{}] {}", short_id(task.id), task.title);
        }
        TaskAction::Update {
            id,
            title,
            description,
            due,
            priority,
            status,
        } => {
            let due_date = match due.as_deref() {
                None => None,
                Some("") => Some(None),
                Some(value) => Some(Some(parse_due(value).map_err(anyhow::Error::msg)?)),
            };
            let req = UpdateTaskRequest {
                title,
                description: description.map(|d| Some(d).filter(|d| !d.is_empty())),
                due_date,
                priority,
                status,
            };
            let task: Task = api
                .send(api.request(Method::PUT, &format!("/api/tasks/{}", id)).json(&req))
                .await?;
            println!("Updated task: [{}] {}", short_id(task.id), task.title);
        }
        TaskAction::Status { id, status } => {
            let req = UpdateStatusRequest { status };
            let task: Task = api
                .send(
                    api.request(Method::PATCH, &format!("/api/tasks/{}/status", id))
                        .json(&req),
                )
                .await?;
            println!("[{}] is now {}", short_id(task.id), task.status.label());
        }
        TaskAction::Done { id } => {
            let req = UpdateStatusRequest {
                status: TaskStatus::Completed,
            };
            let task: Task = api
                .send(
                    api.request(Method::PATCH, &format!("/api/tasks/{}/status", id))
                        .json(&req),
                )
                .await?;
            println!("Completed: [{}] {}", short_id(task.id), task.title);
        }
        TaskAction::Undo { id } => {
            let current: Task = api
                .send(api.request(Method::GET, &format!("/api/tasks/{}", id)))
                .await?;
            if !current.is_completed() {
                println!("[{}] is not completed", short_id(current.id));
                return Ok(());
            }
            let task: Task = api
                .send(api.request(Method::POST, &format!("/api/tasks/{}/toggle", id)))
                .await?;
            println!(
                "Reopened: [{}] {} ({})",
                short_id(task.id),
                task.title,
                task.status.label()
            );
        }
        TaskAction::Delete { id } => {
            check(
                api.request(Method::DELETE, &format!("/api/tasks/{}", id))
                    .send()
                    .await
                    .context("Request failed")?,
            )
            .await?;
            println!("Deleted task: {}", id);
        }
        TaskAction::Stats => {
            let stats: TaskStats = api
                .send(api.request(Method::GET, "/api/tasks/stats"))
                .await?;
            println!("Total:       {}", stats.total);
            println!("Pending:     {}", stats.pending);
            println!("In progress: {}", stats.in_progress);
            println!("Completed:   {}", stats.completed);
            println!("Overdue:     {}", stats.overdue);
        }
    }

    Ok(())
}

async fn handle_settings(api: &Api, action: SettingsAction) -> anyhow::Result<()> {
    use reqwest::Method;

    let settings: UserSettings = match action {
        SettingsAction::Show => api.send(api.request(Method::GET, "/api/settings")).await?,
        SettingsAction::Set {
            email_notifications,
            calendar_sync,
        } => {
            let req = UpdateSettingsRequest {
                email_notifications,
                calendar_sync,
            };
            api.send(api.request(Method::PUT, "/api/settings").json(&req))
                .await?
        }
    };

    let on_off = |b: bool| if b { "on" } else { "off" };
    println!("Email notifications: {}", on_off(settings.email_notifications));
    println!("Calendar sync:       {}", on_off(settings.calendar_sync));
    Ok(())
}
