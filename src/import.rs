//! Bulk import of polls and users from CSV.
//!
//! Every row is handled on its own: a row that cannot be parsed or is rejected
//! is logged and counted as failed, and the import carries on with the next.
//! Only a missing required column fails the whole file.

use std::io::Read;
use std::path::{Path, PathBuf};

use rocket::tokio::fs;
use serde::{de::DeserializeOwned, Deserialize};

use crate::error::{Error, Result};
use crate::model::{
    api::{import::ImportReport, poll::PollSpec, user::UserSpec},
    common::{
        options::PollOptions,
        role::Role,
        tenant::{Scope, TenantId},
    },
    db::user::NewUser,
};
use crate::store::{create_poll, Store, Upserted};

/// Columns of a polls file. `options` holds comma-separated labels.
#[derive(Debug, Deserialize)]
struct PollRow {
    question: String,
    options: String,
    institute_id: String,
    #[serde(default)]
    institute: Option<String>,
}

const POLL_COLUMNS: &[&str] = &["question", "options", "institute_id"];

impl From<PollRow> for PollSpec {
    fn from(row: PollRow) -> Self {
        Self {
            question: row.question,
            options: PollOptions::parse(&row.options)
                .iter()
                .map(str::to_string)
                .collect(),
            tenant_id: TenantId::new(row.institute_id),
            institute: row.institute.filter(|name| !name.trim().is_empty()),
        }
    }
}

/// Columns of a users file. `user_type` is a role name.
#[derive(Debug, Deserialize)]
struct UserRow {
    username: String,
    password: String,
    user_type: String,
    #[serde(default)]
    institute_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

const USER_COLUMNS: &[&str] = &["username", "password", "user_type"];

impl TryFrom<UserRow> for UserSpec {
    type Error = Error;

    fn try_from(row: UserRow) -> Result<Self> {
        let role: Role = row.user_type.parse().map_err(Error::Validation)?;
        Ok(Self {
            username: row.username,
            name: row.name,
            password: row.password,
            role,
            tenant_id: row.institute_id.map(TenantId::new),
        })
    }
}

/// Create a poll for every row. Rows for a tenant outside `scope` fail, and
/// rows for an existing `(question, institute_id)` pair are skipped.
pub async fn import_polls<R: Read>(
    store: &dyn Store,
    reader: R,
    scope: &Scope,
) -> Result<ImportReport> {
    let rows = read_rows::<PollRow, _>(reader, POLL_COLUMNS)?;
    let mut report = ImportReport::default();

    for (line, row) in rows {
        let spec: PollSpec = match row {
            Ok(row) => row.into(),
            Err(e) => {
                warn!("Skipping poll on line {line}: {e}");
                report.failed += 1;
                continue;
            }
        };
        if !scope.permits(&spec.tenant_id) {
            warn!(
                "Skipping poll on line {line}: institute '{}' is out of scope",
                spec.tenant_id
            );
            report.failed += 1;
            continue;
        }
        match create_poll(store, spec).await {
            Ok(Some(_)) => report.created += 1,
            Ok(None) => report.skipped += 1,
            Err(e) => {
                warn!("Skipping poll on line {line}: {e}");
                report.failed += 1;
            }
        }
    }

    info!(
        "Imported polls: {} created, {} skipped, {} failed",
        report.created, report.skipped, report.failed
    );
    Ok(report)
}

/// Insert a user for every row, or update the password, role and institute of
/// the user who already has that username.
pub async fn import_users<R: Read>(store: &dyn Store, reader: R) -> Result<ImportReport> {
    let rows = read_rows::<UserRow, _>(reader, USER_COLUMNS)?;
    let mut report = ImportReport::default();

    for (line, row) in rows {
        let user = row
            .map_err(Error::from)
            .and_then(UserSpec::try_from)
            .and_then(NewUser::try_from);
        let user = match user {
            Ok(user) => user,
            Err(e) => {
                warn!("Skipping user on line {line}: {e}");
                report.failed += 1;
                continue;
            }
        };
        match store.upsert_user(&user).await {
            Ok(Upserted::Inserted(id)) => {
                debug!("Added user '{}' ({id})", user.username);
                report.created += 1;
            }
            Ok(Upserted::Updated(id)) => {
                debug!("Updated user '{}' ({id})", user.username);
                report.skipped += 1;
            }
            Err(e) => {
                warn!("Skipping user on line {line}: {e}");
                report.failed += 1;
            }
        }
    }

    info!(
        "Imported users: {} added, {} updated, {} failed",
        report.created, report.skipped, report.failed
    );
    Ok(report)
}

/// Import every `.csv` file in `dir`, in file name order. Files whose name
/// starts with `polls` hold polls; all others hold users. Users are imported
/// first.
pub async fn import_dir(store: &dyn Store, dir: &Path) -> Result<ImportReport> {
    let mut files = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        files.push(entry.path());
    }
    files.retain(|path| path.extension().map_or(false, |ext| ext == "csv"));
    files.sort();

    let is_polls = |path: &Path| {
        path.file_name()
            .and_then(|name| name.to_str())
            .map_or(false, |name| name.starts_with("polls"))
    };
    let (polls, users): (Vec<PathBuf>, Vec<PathBuf>) = files
        .into_iter()
        .partition(|path| is_polls(path.as_path()));

    let mut report = ImportReport::default();
    for path in users {
        info!("Importing users from {}", path.display());
        let contents = fs::read(&path).await?;
        report += import_users(store, contents.as_slice()).await?;
    }
    for path in polls {
        info!("Importing polls from {}", path.display());
        let contents = fs::read(&path).await?;
        report += import_polls(store, contents.as_slice(), &Scope::Global).await?;
    }
    Ok(report)
}

/// Read all data rows up front, each tagged with its line number.
fn read_rows<T, R>(reader: R, required: &[&str]) -> Result<Vec<(usize, csv::Result<T>)>>
where
    T: DeserializeOwned,
    R: Read,
{
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let missing: Vec<_> = required
        .iter()
        .filter(|column| !headers.iter().any(|header| header == **column))
        .collect();
    if !missing.is_empty() {
        return Err(Error::validation(format!(
            "Missing required columns: {missing:?}"
        )));
    }

    Ok(reader
        .deserialize()
        .enumerate()
        // Line 1 is the header.
        .map(|(i, row)| (i + 2, row))
        .collect())
}

#[cfg(test)]
mod tests {
    use crate::store::MemoryStore;

    use super::*;

    const POLLS: &str = "\
question,options,institute_id,institute
Favourite colour?,\"Red, Blue\",inst1,First Institute
Best lunch option?,\"Pasta,Curry,,Salad\",inst2,
";

    const USERS: &str = "\
username,password,user_type,institute_id,name
coordinator,pollmaster,master_admin,,Chief Coordinator
inst1-admin,localpower,local_admin,inst1,
alice,alicepassword,student,inst1,Alice
";

    #[rocket::async_test]
    async fn polls_are_created() {
        let store = MemoryStore::default();

        let report = import_polls(&store, POLLS.as_bytes(), &Scope::Global)
            .await
            .unwrap();
        assert_eq!(
            report,
            ImportReport {
                created: 2,
                skipped: 0,
                failed: 0
            }
        );

        let polls = store.polls(None).await.unwrap();
        assert_eq!(polls[0].question, "Favourite colour?");
        assert_eq!(polls[0].options(), ["Red", "Blue"]);
        assert_eq!(polls[0].institute, "First Institute");
        assert_eq!(polls[1].options(), ["Pasta", "Curry", "Salad"]);
        assert_eq!(polls[1].institute, "Institute inst2");
        assert!(polls.iter().all(|poll| poll.active && poll.responses.is_empty()));
    }

    #[rocket::async_test]
    async fn reimport_creates_nothing() {
        let store = MemoryStore::default();
        import_polls(&store, POLLS.as_bytes(), &Scope::Global)
            .await
            .unwrap();

        let report = import_polls(&store, POLLS.as_bytes(), &Scope::Global)
            .await
            .unwrap();
        assert_eq!(report.created, 0);
        assert_eq!(report.skipped, 2);
        assert_eq!(store.polls(None).await.unwrap().len(), 2);
    }

    #[rocket::async_test]
    async fn bad_rows_are_skipped() {
        let store = MemoryStore::default();
        let csv = "\
question,options,institute_id
,Red,inst1
No options?, , inst1
Valid?,Yes,inst1
Too few columns
";

        let report = import_polls(&store, csv.as_bytes(), &Scope::Global)
            .await
            .unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.failed, 3);
        assert_eq!(report.rows(), 4);
    }

    #[rocket::async_test]
    async fn missing_column_fails_the_file() {
        let store = MemoryStore::default();
        let csv = "question,institute_id\nColour?,inst1\n";

        let result = import_polls(&store, csv.as_bytes(), &Scope::Global).await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[rocket::async_test]
    async fn scoped_import_rejects_other_tenants() {
        let store = MemoryStore::default();

        let report = import_polls(&store, POLLS.as_bytes(), &Scope::Tenant("inst1".into()))
            .await
            .unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.failed, 1);
        assert!(store
            .polls(Some(&"inst2".into()))
            .await
            .unwrap()
            .is_empty());
    }

    #[rocket::async_test]
    async fn users_are_added_then_updated() {
        let store = MemoryStore::default();

        let report = import_users(&store, USERS.as_bytes()).await.unwrap();
        assert_eq!(report.created, 3);

        let admin = store.user_by_username("coordinator").await.unwrap().unwrap();
        assert_eq!(admin.role, Role::GlobalAdmin);
        assert_eq!(admin.tenant_id, None);
        assert_eq!(admin.name, "Chief Coordinator");
        let local = store.user_by_username("inst1-admin").await.unwrap().unwrap();
        assert_eq!(local.name, "inst1-admin");
        assert_eq!(local.tenant_id, Some("inst1".into()));

        let changed = "\
username,password,user_type,institute_id
alice,newpassword,local_admin,inst2
";
        let report = import_users(&store, changed.as_bytes()).await.unwrap();
        assert_eq!(report.skipped, 1);

        let alice = store.user_by_username("alice").await.unwrap().unwrap();
        assert_eq!(alice.role, Role::LocalAdmin);
        assert_eq!(alice.tenant_id, Some("inst2".into()));
        assert!(alice.verify_password("newpassword"));
        assert_eq!(store.users(None).await.unwrap().len(), 3);
    }

    #[rocket::async_test]
    async fn unknown_user_type_fails_the_row() {
        let store = MemoryStore::default();
        let csv = "\
username,password,user_type
mallory,secret,superuser
bob,bobpassword,voter
";

        let report = import_users(&store, csv.as_bytes()).await.unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.failed, 1);
        assert!(store.user_by_username("mallory").await.unwrap().is_none());
    }

    #[rocket::async_test]
    async fn seed_directory_is_imported() {
        let dir = std::env::temp_dir().join(format!("instapoll-seed-{}", rand::random::<u32>()));
        fs::create_dir_all(&dir).await.unwrap();
        fs::write(dir.join("polls.csv"), POLLS).await.unwrap();
        fs::write(dir.join("users.csv"), USERS).await.unwrap();
        fs::write(dir.join("notes.txt"), "not,a,seed\n").await.unwrap();

        let store = MemoryStore::default();
        let report = import_dir(&store, &dir).await.unwrap();
        assert_eq!(
            report,
            ImportReport {
                created: 5,
                skipped: 0,
                failed: 0
            }
        );
        assert_eq!(store.polls(None).await.unwrap().len(), 2);
        assert_eq!(store.users(None).await.unwrap().len(), 3);

        // Seeding again changes nothing.
        let report = import_dir(&store, &dir).await.unwrap();
        assert_eq!(report.created, 0);
        assert_eq!(store.polls(None).await.unwrap().len(), 2);

        fs::remove_dir_all(&dir).await.unwrap();
    }
}
