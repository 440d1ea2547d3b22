use rocket::{serde::json::Json, Route};

use crate::{
    error::{Error, Result},
    import::{import_polls, import_users},
    model::{
        api::{
            auth::{Admin, AuthToken},
            import::ImportReport,
            poll::{PollDescription, PollSpec},
            user::UserDescription,
        },
        common::role::Role,
        mongodb::Id,
    },
    store::{create_poll, get_poll, Storage},
    vote::visible_poll,
};

pub fn routes() -> Vec<Route> {
    routes![
        create,
        close_poll,
        open_poll,
        import_poll_csv,
        import_user_csv,
        get_users,
    ]
}

/// Create a poll. Local admins may only create polls for their own institute.
#[post("/polls", data = "<spec>", format = "json")]
async fn create(
    token: AuthToken<Admin>,
    spec: Json<PollSpec>,
    store: Storage,
) -> Result<Json<PollDescription>> {
    if !token.scope().permits(&spec.tenant_id) {
        return Err(Error::Forbidden(format!(
            "Cannot create polls for institute '{}'",
            spec.tenant_id
        )));
    }

    let question = spec.question.trim().to_string();
    let tenant_id = spec.tenant_id.clone();
    let poll_id = create_poll(&*store, spec.0).await?.ok_or_else(|| {
        Error::validation(format!(
            "Poll {question:?} already exists for institute '{tenant_id}'"
        ))
    })?;

    let poll = get_poll(&*store, poll_id).await?;
    Ok(Json(PollDescription::for_viewer(poll, token.id())))
}

#[post("/polls/<poll_id>/close")]
async fn close_poll(
    token: AuthToken<Admin>,
    poll_id: Id,
    store: Storage,
) -> Result<Json<PollDescription>> {
    set_active(token, poll_id, false, store).await
}

#[post("/polls/<poll_id>/open")]
async fn open_poll(
    token: AuthToken<Admin>,
    poll_id: Id,
    store: Storage,
) -> Result<Json<PollDescription>> {
    set_active(token, poll_id, true, store).await
}

async fn set_active(
    token: AuthToken<Admin>,
    poll_id: Id,
    active: bool,
    store: Storage,
) -> Result<Json<PollDescription>> {
    // Only polls in scope may be changed.
    visible_poll(&*store, poll_id, &token.scope()).await?;
    if !store.set_active(poll_id, active).await? {
        return Err(Error::not_found(format!("Poll with ID '{poll_id}'")));
    }
    info!(
        "Poll {poll_id} {} by {}",
        if active { "opened" } else { "closed" },
        token.id()
    );

    let poll = get_poll(&*store, poll_id).await?;
    Ok(Json(PollDescription::for_viewer(poll, token.id())))
}

/// Import polls from a CSV body. Rows for institutes outside the admin's scope
/// are counted as failed.
#[post("/import/polls", data = "<csv>")]
async fn import_poll_csv(
    token: AuthToken<Admin>,
    csv: String,
    store: Storage,
) -> Result<Json<ImportReport>> {
    let report = import_polls(&*store, csv.as_bytes(), &token.scope()).await?;
    Ok(Json(report))
}

/// Import users from a CSV body. Global admins only.
#[post("/import/users", data = "<csv>")]
async fn import_user_csv(
    token: AuthToken<Admin>,
    csv: String,
    store: Storage,
) -> Result<Json<ImportReport>> {
    match token.role() {
        Role::GlobalAdmin => {}
        Role::LocalAdmin | Role::Voter => {
            return Err(Error::Forbidden(
                "Only global admins may import users".to_string(),
            ))
        }
    }
    let report = import_users(&*store, csv.as_bytes()).await?;
    Ok(Json(report))
}

#[get("/users")]
async fn get_users(
    token: AuthToken<Admin>,
    store: Storage,
) -> Result<Json<Vec<UserDescription>>> {
    let scope = token.scope();
    let users = store.users(scope.tenant()).await?;
    Ok(Json(
        scope
            .filter(users)
            .into_iter()
            .map(UserDescription::from)
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::serde_json::json,
    };

    use crate::model::{api::user::UserSpec, db::user::NewUser};

    use super::*;

    async fn post_poll(client: &Client, spec: &PollSpec) -> Status {
        client
            .post(uri!(create))
            .header(ContentType::JSON)
            .body(json!(spec).to_string())
            .dispatch()
            .await
            .status()
    }

    #[backend_test(admin)]
    async fn create_poll_via_api(client: Client, storage: Storage) {
        let response = client
            .post(uri!(create))
            .header(ContentType::JSON)
            .body(json!(PollSpec::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let description: PollDescription = response.into_json().await.unwrap();
        assert_eq!(description.question, "Favourite colour?");
        assert_eq!(description.options, vec!["Red", "Blue"]);
        assert_eq!(description.institute, "First Institute");
        assert!(description.active);
        assert!(!description.voted);

        // The same question for the same institute is rejected.
        let status = post_poll(&client, &PollSpec::example()).await;
        assert_eq!(Status::BadRequest, status);

        // Invalid specs are rejected.
        let mut no_options = PollSpec::example();
        no_options.question = "Another?".to_string();
        no_options.options = vec![];
        assert_eq!(Status::BadRequest, post_poll(&client, &no_options).await);

        // Labels are never split into several options.
        let mut comma = PollSpec::example();
        comma.question = "Coming?".to_string();
        comma.options = vec!["Yes, definitely".to_string(), "No".to_string()];
        assert_eq!(Status::BadRequest, post_poll(&client, &comma).await);

        assert_eq!(storage.polls(None).await.unwrap().len(), 1);
    }

    #[backend_test(local_admin)]
    async fn local_admin_is_confined(client: Client, storage: Storage) {
        assert_eq!(Status::Ok, post_poll(&client, &PollSpec::example()).await);
        assert_eq!(
            Status::Forbidden,
            post_poll(&client, &PollSpec::other_tenant_example()).await
        );
        assert!(storage
            .polls(Some(&"inst2".into()))
            .await
            .unwrap()
            .is_empty());

        // Poll imports are filtered to the admin's own institute.
        let csv = "\
question,options,institute_id
Own?,Yes,inst1
Foreign?,Yes,inst2
";
        let response = client
            .post(uri!(import_poll_csv))
            .header(ContentType::CSV)
            .body(csv)
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let report: ImportReport = response.into_json().await.unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.failed, 1);

        // User imports are reserved for global admins.
        let response = client
            .post(uri!(import_user_csv))
            .header(ContentType::CSV)
            .body("username,password,user_type\nx,y,student\n")
            .dispatch()
            .await;
        assert_eq!(Status::Forbidden, response.status());
        assert!(storage.user_by_username("x").await.unwrap().is_none());
    }

    #[backend_test(admin)]
    async fn close_and_reopen(client: Client, storage: Storage) {
        let poll_id = create_poll(&*storage, PollSpec::example())
            .await
            .unwrap()
            .unwrap();

        let response = client.post(uri!(close_poll(poll_id))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let description: PollDescription = response.into_json().await.unwrap();
        assert!(!description.active);
        assert!(!storage.poll(poll_id).await.unwrap().unwrap().active);

        let response = client.post(uri!(open_poll(poll_id))).dispatch().await;
        let description: PollDescription = response.into_json().await.unwrap();
        assert!(description.active);

        let response = client.post(uri!(close_poll(Id::new()))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test(voter)]
    async fn voters_are_not_admins(client: Client, storage: Storage) {
        assert_eq!(
            Status::Forbidden,
            post_poll(&client, &PollSpec::example()).await
        );
        let response = client.get(uri!(get_users)).dispatch().await;
        assert_eq!(Status::Forbidden, response.status());
        assert!(storage.polls(None).await.unwrap().is_empty());
    }

    #[backend_test(admin)]
    async fn import_users_and_list(client: Client, storage: Storage) {
        let csv = "\
username,password,user_type,institute_id,name
inst1-admin,localpower,local_admin,inst1,
alice,alicepassword,student,inst1,Alice
carol,carolpassword,student,inst2,Carol
";
        let response = client
            .post(uri!(import_user_csv))
            .header(ContentType::CSV)
            .body(csv)
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let report: ImportReport = response.into_json().await.unwrap();
        assert_eq!(report.created, 3);

        // The global admin sees everyone, including themselves.
        let response = client.get(uri!(get_users)).dispatch().await;
        let users: Vec<UserDescription> = response.into_json().await.unwrap();
        assert_eq!(users.len(), 4);

        // A local admin sees only their own institute.
        let local = UserSpec::local_admin_example();
        storage
            .upsert_user(&NewUser::try_from(local.clone()).unwrap())
            .await
            .unwrap();
        client
            .post(uri!(crate::api::auth::login))
            .header(ContentType::JSON)
            .body(json!(local.credentials()).to_string())
            .dispatch()
            .await;
        let response = client.get(uri!(get_users)).dispatch().await;
        let users: Vec<UserDescription> = response.into_json().await.unwrap();
        let mut names: Vec<_> = users.into_iter().map(|user| user.username).collect();
        names.sort();
        assert_eq!(names, ["alice", "inst1-admin"]);
    }
}
