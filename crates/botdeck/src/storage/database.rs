//! SQLite store for accounts, projects and conversation history
//!
//! Single connection behind a mutex; every multi-row cascade is a sequence of
//! single statements (no cross-statement transaction), matching the
//! single-document atomicity model of the platform.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{
    Conversation, Message, MessageRole, Project, ProjectCounts, Prompt, Role, StoredFile, User,
};

/// SQLite-backed store
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

/// Partial update for a project; `None` keeps the stored value
#[derive(Debug, Default, Clone)]
pub struct ProjectChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub system_prompt: Option<String>,
    pub model: Option<String>,
}

/// Platform-wide totals for the admin dashboard
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct PlatformStats {
    pub users: usize,
    pub projects: usize,
    pub conversations: usize,
    pub messages: usize,
    pub files: usize,
}

impl Database {
    /// Create or open the database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| Error::Database(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("Failed to open in-memory database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate()?;
        Ok(db)
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
        "#,
        )
        .map_err(|e| Error::Database(format!("Failed to set pragmas: {}", e)))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                name TEXT NOT NULL,
                role TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);

            CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT,
                system_prompt TEXT NOT NULL,
                model TEXT NOT NULL,
                user_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_projects_user_id ON projects(user_id);

            CREATE TABLE IF NOT EXISTS prompts (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                content TEXT NOT NULL,
                project_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_prompts_project_id ON prompts(project_id);

            CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                project_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_conversations_project_id ON conversations(project_id);

            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                conversation_id TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_messages_conversation_id ON messages(conversation_id);

            CREATE TABLE IF NOT EXISTS files (
                id TEXT PRIMARY KEY,
                stored_name TEXT NOT NULL,
                original_name TEXT NOT NULL,
                mime_type TEXT NOT NULL,
                size INTEGER NOT NULL,
                content_hash TEXT NOT NULL,
                project_id TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_files_project_id ON files(project_id);
        "#,
        )
        .map_err(|e| Error::Database(format!("Failed to run migrations: {}", e)))?;

        tracing::info!("Database migrations complete");
        Ok(())
    }

    /// Cheap connectivity probe for the health endpoint
    pub fn health_check(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    // ==================== Users ====================

    /// Insert a new account; a duplicate email maps to [`Error::EmailTaken`]
    pub fn insert_user(&self, user: &User) -> Result<()> {
        let conn = self.conn.lock();

        let result = conn.execute(
            r#"
            INSERT INTO users (id, email, password_hash, name, role, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                user.id.to_string(),
                user.email,
                user.password_hash,
                user.name,
                user.role.as_str(),
                user.created_at.to_rfc3339(),
                user.updated_at.to_rfc3339(),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::EmailTaken)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare("SELECT * FROM users WHERE email = ?1")?;
        let user = stmt
            .query_row(params![email.trim().to_lowercase()], row_to_user)
            .optional()?;

        Ok(user)
    }

    pub fn get_user(&self, id: &Uuid) -> Result<Option<User>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare("SELECT * FROM users WHERE id = ?1")?;
        let user = stmt
            .query_row(params![id.to_string()], row_to_user)
            .optional()?;

        Ok(user)
    }

    /// All accounts, newest first
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare("SELECT * FROM users ORDER BY created_at DESC")?;
        let users = stmt
            .query_map([], row_to_user)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(users)
    }

    pub fn update_user_password(&self, id: &Uuid, password_hash: &str) -> Result<bool> {
        let conn = self.conn.lock();

        let count = conn.execute(
            "UPDATE users SET password_hash = ?2, updated_at = ?3 WHERE id = ?1",
            params![id.to_string(), password_hash, Utc::now().to_rfc3339()],
        )?;

        Ok(count > 0)
    }

    pub fn delete_user(&self, id: &Uuid) -> Result<bool> {
        let conn = self.conn.lock();
        let count = conn.execute("DELETE FROM users WHERE id = ?1", params![id.to_string()])?;
        Ok(count > 0)
    }

    pub fn count_projects_for_user(&self, user_id: &Uuid) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM projects WHERE user_id = ?1",
            params![user_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    // ==================== Projects ====================

    pub fn insert_project(&self, project: &Project) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            r#"
            INSERT INTO projects (id, name, description, system_prompt, model, user_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                project.id.to_string(),
                project.name,
                project.description,
                project.system_prompt,
                project.model,
                project.user_id.to_string(),
                project.created_at.to_rfc3339(),
                project.updated_at.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    /// The caller's projects, most recently updated first
    pub fn list_projects_for_user(&self, user_id: &Uuid) -> Result<Vec<Project>> {
        let conn = self.conn.lock();

        let mut stmt =
            conn.prepare("SELECT * FROM projects WHERE user_id = ?1 ORDER BY updated_at DESC")?;
        let projects = stmt
            .query_map(params![user_id.to_string()], row_to_project)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(projects)
    }

    /// Fetch a project only when it belongs to `user_id`. Every route that
    /// touches project-owned data goes through this lookup.
    pub fn get_project_owned(&self, id: &Uuid, user_id: &Uuid) -> Result<Option<Project>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare("SELECT * FROM projects WHERE id = ?1 AND user_id = ?2")?;
        let project = stmt
            .query_row(params![id.to_string(), user_id.to_string()], row_to_project)
            .optional()?;

        Ok(project)
    }

    /// Apply a partial update; omitted fields keep their stored value.
    /// Returns the updated row, or `None` when the project is not owned by
    /// `user_id`.
    pub fn update_project(
        &self,
        id: &Uuid,
        user_id: &Uuid,
        changes: &ProjectChanges,
    ) -> Result<Option<Project>> {
        {
            let conn = self.conn.lock();
            let count = conn.execute(
                r#"
                UPDATE projects SET
                    name = COALESCE(?3, name),
                    description = COALESCE(?4, description),
                    system_prompt = COALESCE(?5, system_prompt),
                    model = COALESCE(?6, model),
                    updated_at = ?7
                WHERE id = ?1 AND user_id = ?2
                "#,
                params![
                    id.to_string(),
                    user_id.to_string(),
                    changes.name,
                    changes.description,
                    changes.system_prompt,
                    changes.model,
                    Utc::now().to_rfc3339(),
                ],
            )?;

            if count == 0 {
                return Ok(None);
            }
        }

        self.get_project_owned(id, user_id)
    }

    /// Delete a project and every descendant row. Returns the stored names of
    /// the project's files so the caller can unlink their bytes.
    pub fn delete_project_cascade(&self, project_id: &Uuid) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let id = project_id.to_string();

        let stored_names: Vec<String> = {
            let mut stmt = conn.prepare("SELECT stored_name FROM files WHERE project_id = ?1")?;
            let names = stmt
                .query_map(params![id], |row| row.get(0))?
                .filter_map(|r| r.ok())
                .collect();
            names
        };

        conn.execute(
            "DELETE FROM messages WHERE conversation_id IN (SELECT id FROM conversations WHERE project_id = ?1)",
            params![id],
        )?;
        conn.execute("DELETE FROM conversations WHERE project_id = ?1", params![id])?;
        conn.execute("DELETE FROM prompts WHERE project_id = ?1", params![id])?;
        conn.execute("DELETE FROM files WHERE project_id = ?1", params![id])?;
        conn.execute("DELETE FROM projects WHERE id = ?1", params![id])?;

        Ok(stored_names)
    }

    /// Child counts for one project
    pub fn project_counts(&self, project_id: &Uuid) -> Result<ProjectCounts> {
        let conn = self.conn.lock();
        let id = project_id.to_string();

        let count_for = |sql: &str| -> Result<usize> {
            let count: i64 = conn.query_row(sql, params![id], |row| row.get(0))?;
            Ok(count as usize)
        };

        Ok(ProjectCounts {
            prompts: count_for("SELECT COUNT(*) FROM prompts WHERE project_id = ?1")?,
            conversations: count_for("SELECT COUNT(*) FROM conversations WHERE project_id = ?1")?,
            files: count_for("SELECT COUNT(*) FROM files WHERE project_id = ?1")?,
        })
    }

    // ==================== Prompts ====================

    pub fn insert_prompt(&self, prompt: &Prompt) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            r#"
            INSERT INTO prompts (id, name, content, project_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                prompt.id.to_string(),
                prompt.name,
                prompt.content,
                prompt.project_id.to_string(),
                prompt.created_at.to_rfc3339(),
                prompt.updated_at.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    /// A project's prompt snippets, newest first
    pub fn list_prompts_for_project(&self, project_id: &Uuid) -> Result<Vec<Prompt>> {
        let conn = self.conn.lock();

        let mut stmt =
            conn.prepare("SELECT * FROM prompts WHERE project_id = ?1 ORDER BY created_at DESC")?;
        let prompts = stmt
            .query_map(params![project_id.to_string()], row_to_prompt)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(prompts)
    }

    pub fn get_prompt(&self, id: &Uuid) -> Result<Option<Prompt>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare("SELECT * FROM prompts WHERE id = ?1")?;
        let prompt = stmt
            .query_row(params![id.to_string()], row_to_prompt)
            .optional()?;

        Ok(prompt)
    }

    pub fn update_prompt(
        &self,
        id: &Uuid,
        name: Option<&str>,
        content: Option<&str>,
    ) -> Result<Option<Prompt>> {
        {
            let conn = self.conn.lock();
            let count = conn.execute(
                r#"
                UPDATE prompts SET
                    name = COALESCE(?2, name),
                    content = COALESCE(?3, content),
                    updated_at = ?4
                WHERE id = ?1
                "#,
                params![id.to_string(), name, content, Utc::now().to_rfc3339()],
            )?;

            if count == 0 {
                return Ok(None);
            }
        }

        self.get_prompt(id)
    }

    pub fn delete_prompt(&self, id: &Uuid) -> Result<bool> {
        let conn = self.conn.lock();
        let count = conn.execute("DELETE FROM prompts WHERE id = ?1", params![id.to_string()])?;
        Ok(count > 0)
    }

    // ==================== Conversations ====================

    pub fn insert_conversation(&self, conversation: &Conversation) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            r#"
            INSERT INTO conversations (id, title, project_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                conversation.id.to_string(),
                conversation.title,
                conversation.project_id.to_string(),
                conversation.created_at.to_rfc3339(),
                conversation.updated_at.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    /// A project's conversations, most recently updated first
    pub fn list_conversations_for_project(&self, project_id: &Uuid) -> Result<Vec<Conversation>> {
        let conn = self.conn.lock();

        let mut stmt = conn
            .prepare("SELECT * FROM conversations WHERE project_id = ?1 ORDER BY updated_at DESC")?;
        let conversations = stmt
            .query_map(params![project_id.to_string()], row_to_conversation)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(conversations)
    }

    /// The most recently updated conversations of a project
    pub fn recent_conversations_for_project(
        &self,
        project_id: &Uuid,
        limit: usize,
    ) -> Result<Vec<Conversation>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            "SELECT * FROM conversations WHERE project_id = ?1 ORDER BY updated_at DESC LIMIT ?2",
        )?;
        let conversations = stmt
            .query_map(
                params![project_id.to_string(), limit as i64],
                row_to_conversation,
            )?
            .filter_map(|r| r.ok())
            .collect();

        Ok(conversations)
    }

    pub fn get_conversation(&self, id: &Uuid) -> Result<Option<Conversation>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare("SELECT * FROM conversations WHERE id = ?1")?;
        let conversation = stmt
            .query_row(params![id.to_string()], row_to_conversation)
            .optional()?;

        Ok(conversation)
    }

    /// Fetch a conversation only when it belongs to the given project
    pub fn get_conversation_in_project(
        &self,
        id: &Uuid,
        project_id: &Uuid,
    ) -> Result<Option<Conversation>> {
        let conn = self.conn.lock();

        let mut stmt =
            conn.prepare("SELECT * FROM conversations WHERE id = ?1 AND project_id = ?2")?;
        let conversation = stmt
            .query_row(
                params![id.to_string(), project_id.to_string()],
                row_to_conversation,
            )
            .optional()?;

        Ok(conversation)
    }

    /// Bump a conversation's updated_at after a completed chat turn
    pub fn touch_conversation(&self, id: &Uuid) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE conversations SET updated_at = ?2 WHERE id = ?1",
            params![id.to_string(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Delete a conversation and its messages
    pub fn delete_conversation_cascade(&self, id: &Uuid) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM messages WHERE conversation_id = ?1",
            params![id.to_string()],
        )?;
        conn.execute(
            "DELETE FROM conversations WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(())
    }

    pub fn count_messages_for_conversation(&self, conversation_id: &Uuid) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1",
            params![conversation_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    // ==================== Messages ====================

    pub fn insert_message(&self, message: &Message) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            r#"
            INSERT INTO messages (id, role, content, conversation_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                message.id.to_string(),
                message.role.as_str(),
                message.content,
                message.conversation_id.to_string(),
                message.created_at.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    /// A conversation's messages in creation order
    pub fn list_messages(&self, conversation_id: &Uuid) -> Result<Vec<Message>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            "SELECT * FROM messages WHERE conversation_id = ?1 ORDER BY created_at ASC, rowid ASC",
        )?;
        let messages = stmt
            .query_map(params![conversation_id.to_string()], row_to_message)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(messages)
    }

    // ==================== Files ====================

    pub fn insert_file(&self, file: &StoredFile) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            r#"
            INSERT INTO files (id, stored_name, original_name, mime_type, size, content_hash, project_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                file.id.to_string(),
                file.stored_name,
                file.original_name,
                file.mime_type,
                file.size as i64,
                file.content_hash,
                file.project_id.to_string(),
                file.created_at.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    /// A project's files, newest first
    pub fn list_files_for_project(&self, project_id: &Uuid) -> Result<Vec<StoredFile>> {
        let conn = self.conn.lock();

        let mut stmt =
            conn.prepare("SELECT * FROM files WHERE project_id = ?1 ORDER BY created_at DESC")?;
        let files = stmt
            .query_map(params![project_id.to_string()], row_to_file)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(files)
    }

    pub fn get_file(&self, id: &Uuid) -> Result<Option<StoredFile>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare("SELECT * FROM files WHERE id = ?1")?;
        let file = stmt
            .query_row(params![id.to_string()], row_to_file)
            .optional()?;

        Ok(file)
    }

    pub fn delete_file(&self, id: &Uuid) -> Result<bool> {
        let conn = self.conn.lock();
        let count = conn.execute("DELETE FROM files WHERE id = ?1", params![id.to_string()])?;
        Ok(count > 0)
    }

    // ==================== Aggregates ====================

    /// Platform-wide totals for the admin dashboard
    pub fn platform_stats(&self) -> Result<PlatformStats> {
        let conn = self.conn.lock();

        let count_for = |sql: &str| -> Result<usize> {
            let count: i64 = conn.query_row(sql, [], |row| row.get(0))?;
            Ok(count as usize)
        };

        Ok(PlatformStats {
            users: count_for("SELECT COUNT(*) FROM users")?,
            projects: count_for("SELECT COUNT(*) FROM projects")?,
            conversations: count_for("SELECT COUNT(*) FROM conversations")?,
            messages: count_for("SELECT COUNT(*) FROM messages")?,
            files: count_for("SELECT COUNT(*) FROM files")?,
        })
    }
}

// Row mappers

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_uuid(s: &str) -> Uuid {
    Uuid::parse_str(s).unwrap_or_else(|_| Uuid::nil())
}

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    let id: String = row.get(0)?;
    let email: String = row.get(1)?;
    let password_hash: String = row.get(2)?;
    let name: String = row.get(3)?;
    let role: String = row.get(4)?;
    let created_at: String = row.get(5)?;
    let updated_at: String = row.get(6)?;

    Ok(User {
        id: parse_uuid(&id),
        email,
        password_hash,
        name,
        role: Role::from_str(&role),
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}

fn row_to_project(row: &rusqlite::Row) -> rusqlite::Result<Project> {
    let id: String = row.get(0)?;
    let name: String = row.get(1)?;
    let description: Option<String> = row.get(2)?;
    let system_prompt: String = row.get(3)?;
    let model: String = row.get(4)?;
    let user_id: String = row.get(5)?;
    let created_at: String = row.get(6)?;
    let updated_at: String = row.get(7)?;

    Ok(Project {
        id: parse_uuid(&id),
        name,
        description,
        system_prompt,
        model,
        user_id: parse_uuid(&user_id),
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}

fn row_to_prompt(row: &rusqlite::Row) -> rusqlite::Result<Prompt> {
    let id: String = row.get(0)?;
    let name: String = row.get(1)?;
    let content: String = row.get(2)?;
    let project_id: String = row.get(3)?;
    let created_at: String = row.get(4)?;
    let updated_at: String = row.get(5)?;

    Ok(Prompt {
        id: parse_uuid(&id),
        name,
        content,
        project_id: parse_uuid(&project_id),
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}

fn row_to_conversation(row: &rusqlite::Row) -> rusqlite::Result<Conversation> {
    let id: String = row.get(0)?;
    let title: String = row.get(1)?;
    let project_id: String = row.get(2)?;
    let created_at: String = row.get(3)?;
    let updated_at: String = row.get(4)?;

    Ok(Conversation {
        id: parse_uuid(&id),
        title,
        project_id: parse_uuid(&project_id),
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}

fn row_to_message(row: &rusqlite::Row) -> rusqlite::Result<Message> {
    let id: String = row.get(0)?;
    let role: String = row.get(1)?;
    let content: String = row.get(2)?;
    let conversation_id: String = row.get(3)?;
    let created_at: String = row.get(4)?;

    Ok(Message {
        id: parse_uuid(&id),
        role: MessageRole::from_str(&role),
        content,
        conversation_id: parse_uuid(&conversation_id),
        created_at: parse_timestamp(&created_at),
    })
}

fn row_to_file(row: &rusqlite::Row) -> rusqlite::Result<StoredFile> {
    let id: String = row.get(0)?;
    let stored_name: String = row.get(1)?;
    let original_name: String = row.get(2)?;
    let mime_type: String = row.get(3)?;
    let size: i64 = row.get(4)?;
    let content_hash: String = row.get(5)?;
    let project_id: String = row.get(6)?;
    let created_at: String = row.get(7)?;

    Ok(StoredFile {
        id: parse_uuid(&id),
        stored_name,
        original_name,
        mime_type,
        size: size as u64,
        content_hash,
        project_id: parse_uuid(&project_id),
        created_at: parse_timestamp(&created_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MessageRole, Role};

    fn user(email: &str) -> User {
        User::new(email, "hash".into(), "Test User", Role::User)
    }

    fn project_for(db: &Database, owner: &User) -> Project {
        let project = Project::new("Support Bot", None, None, None, owner.id);
        db.insert_project(&project).unwrap();
        project
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let db = Database::in_memory().unwrap();
        db.insert_user(&user("a@b.co")).unwrap();

        let err = db.insert_user(&user("a@b.co")).unwrap_err();
        assert!(matches!(err, Error::EmailTaken));
    }

    #[test]
    fn email_lookup_is_case_insensitive() {
        let db = Database::in_memory().unwrap();
        db.insert_user(&user("a@b.co")).unwrap();

        assert!(db.find_user_by_email("  A@B.CO ").unwrap().is_some());
        assert!(db.find_user_by_email("other@b.co").unwrap().is_none());
    }

    #[test]
    fn project_lookups_are_ownership_scoped() {
        let db = Database::in_memory().unwrap();
        let alice = user("alice@b.co");
        let bob = user("bob@b.co");
        db.insert_user(&alice).unwrap();
        db.insert_user(&bob).unwrap();

        let project = project_for(&db, &alice);

        assert!(db.get_project_owned(&project.id, &alice.id).unwrap().is_some());
        assert!(db.get_project_owned(&project.id, &bob.id).unwrap().is_none());
        assert!(db.list_projects_for_user(&bob.id).unwrap().is_empty());

        // Bob cannot update either
        let changes = ProjectChanges {
            name: Some("Hijacked".into()),
            ..Default::default()
        };
        assert!(db.update_project(&project.id, &bob.id, &changes).unwrap().is_none());
        let unchanged = db.get_project_owned(&project.id, &alice.id).unwrap().unwrap();
        assert_eq!(unchanged.name, "Support Bot");
    }

    #[test]
    fn partial_update_keeps_omitted_fields() {
        let db = Database::in_memory().unwrap();
        let owner = user("a@b.co");
        db.insert_user(&owner).unwrap();
        let project = project_for(&db, &owner);

        let changes = ProjectChanges {
            description: Some("FAQ assistant".into()),
            ..Default::default()
        };
        let updated = db.update_project(&project.id, &owner.id, &changes).unwrap().unwrap();

        assert_eq!(updated.name, "Support Bot");
        assert_eq!(updated.description.as_deref(), Some("FAQ assistant"));
        assert_eq!(updated.system_prompt, project.system_prompt);
    }

    #[test]
    fn project_cascade_leaves_no_orphans() {
        let db = Database::in_memory().unwrap();
        let owner = user("a@b.co");
        db.insert_user(&owner).unwrap();
        let project = project_for(&db, &owner);

        let prompt = Prompt::new("Tone", "Be brief.", project.id);
        db.insert_prompt(&prompt).unwrap();

        let conversation = Conversation::new("First question", project.id);
        db.insert_conversation(&conversation).unwrap();
        db.insert_message(&Message::new(MessageRole::User, "hi", conversation.id))
            .unwrap();
        db.insert_message(&Message::new(MessageRole::Assistant, "hello", conversation.id))
            .unwrap();

        let file = StoredFile::new(
            "abc.txt".into(),
            "notes.txt".into(),
            "text/plain".into(),
            5,
            "hash".into(),
            project.id,
        );
        db.insert_file(&file).unwrap();

        let stored = db.delete_project_cascade(&project.id).unwrap();
        assert_eq!(stored, vec!["abc.txt".to_string()]);

        assert!(db.get_project_owned(&project.id, &owner.id).unwrap().is_none());
        assert!(db.list_prompts_for_project(&project.id).unwrap().is_empty());
        assert!(db.list_conversations_for_project(&project.id).unwrap().is_empty());
        assert!(db.list_messages(&conversation.id).unwrap().is_empty());
        assert!(db.list_files_for_project(&project.id).unwrap().is_empty());

        let stats = db.platform_stats().unwrap();
        assert_eq!(stats.projects, 0);
        assert_eq!(stats.conversations, 0);
        assert_eq!(stats.messages, 0);
        assert_eq!(stats.files, 0);
    }

    #[test]
    fn conversation_cascade_deletes_messages() {
        let db = Database::in_memory().unwrap();
        let owner = user("a@b.co");
        db.insert_user(&owner).unwrap();
        let project = project_for(&db, &owner);

        let conversation = Conversation::new("t", project.id);
        db.insert_conversation(&conversation).unwrap();
        db.insert_message(&Message::new(MessageRole::User, "hi", conversation.id))
            .unwrap();

        db.delete_conversation_cascade(&conversation.id).unwrap();

        assert!(db.get_conversation(&conversation.id).unwrap().is_none());
        assert_eq!(db.platform_stats().unwrap().messages, 0);
    }

    #[test]
    fn messages_come_back_in_creation_order() {
        let db = Database::in_memory().unwrap();
        let owner = user("a@b.co");
        db.insert_user(&owner).unwrap();
        let project = project_for(&db, &owner);
        let conversation = Conversation::new("t", project.id);
        db.insert_conversation(&conversation).unwrap();

        for i in 0..5 {
            db.insert_message(&Message::new(
                if i % 2 == 0 { MessageRole::User } else { MessageRole::Assistant },
                format!("message {}", i),
                conversation.id,
            ))
            .unwrap();
        }

        let messages = db.list_messages(&conversation.id).unwrap();
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["message 0", "message 1", "message 2", "message 3", "message 4"]
        );
    }

    #[test]
    fn counts_reflect_children() {
        let db = Database::in_memory().unwrap();
        let owner = user("a@b.co");
        db.insert_user(&owner).unwrap();
        let project = project_for(&db, &owner);

        db.insert_prompt(&Prompt::new("a", "b", project.id)).unwrap();
        db.insert_prompt(&Prompt::new("c", "d", project.id)).unwrap();
        let conversation = Conversation::new("t", project.id);
        db.insert_conversation(&conversation).unwrap();

        let counts = db.project_counts(&project.id).unwrap();
        assert_eq!(counts.prompts, 2);
        assert_eq!(counts.conversations, 1);
        assert_eq!(counts.files, 0);

        assert_eq!(db.count_projects_for_user(&owner.id).unwrap(), 1);
    }
}
