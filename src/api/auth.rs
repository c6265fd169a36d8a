use mongodb::bson::doc;
use rocket::{
    http::{Cookie, CookieJar},
    serde::json::{json, Json},
    Route, State,
};

use crate::{
    error::{Error, Result},
    mail::{Email, Mailer},
    model::{
        api::{
            auth::{
                AuthTokens, Authenticated, ConfirmEmailRequest, EmailRequest, LoginRequest,
                RefreshToken, RegisterRequest, ResetPasswordRequest, Token, TokenPurpose,
                UserRights, AUTH_TOKEN_COOKIE,
            },
            response::{success, success_flat, Success},
            validation::validated,
        },
        db::user::{hash_password, User, UserCore},
        mongodb::{Coll, Id},
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![
        register,
        login,
        refresh,
        logout,
        send_reset_password_email,
        reset_password,
        send_confirmation_email,
        confirm_email,
    ]
}

#[post("/register", data = "<request>", format = "json")]
pub async fn register(
    request: Json<RegisterRequest>,
    users: Coll<User>,
    config: &State<Config>,
    mailer: &State<Mailer>,
) -> Result<Success> {
    let request = validated(request)?;

    let taken = doc! {
        "$or": [{ "username": &request.username }, { "email": &request.email }],
    };
    if users.find_one(taken, None).await?.is_some() {
        return Err(Error::UserAlreadyExists);
    }

    // The unique indexes catch a concurrent registration of the same name.
    let user = User {
        id: Id::new(),
        user: UserCore::new(request.username, request.email, &request.password)?,
    };
    users
        .insert_one(&user, None)
        .await
        .map_err(Error::user_write)?;
    info!("Registered user {} ({})", user.username, user.id);

    let confirmation = Token::email_confirmation(user.id, &user.email).encode(config);
    mailer
        .send_best_effort(Email::welcome(&user, &confirmation))
        .await;

    Ok(success_flat(AuthTokens::for_user(user.id, config)))
}

#[post("/login", data = "<request>", format = "json")]
pub async fn login(
    request: Json<LoginRequest>,
    cookies: &CookieJar<'_>,
    users: Coll<User>,
    config: &State<Config>,
) -> Result<Success> {
    let request = validated(request)?;

    let user = users
        .find_one(doc! { "email": &request.email }, None)
        .await?
        .ok_or(Error::UserNotFound)?;
    if !user.verify_password(&request.password)? {
        return Err(Error::WrongCredentials);
    }

    cookies.add(Token::new(user.id, TokenPurpose::Access).into_cookie(config));
    Ok(success_flat(AuthTokens::for_user(user.id, config)))
}

#[post("/refresh")]
pub async fn refresh(
    token: RefreshToken,
    users: Coll<User>,
    config: &State<Config>,
) -> Result<Success> {
    // Deleted users can't refresh.
    users
        .find_one(token.user_id.as_doc(), None)
        .await?
        .ok_or(Error::NoAuth)?;

    let access_token = Token::new(token.user_id, TokenPurpose::Access).encode(config);
    Ok(success_flat(json!({ "access_token": access_token })))
}

#[delete("/auth")]
pub fn logout(cookies: &CookieJar<'_>) -> Success {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    success()
}

#[post("/send_reset_password_email", data = "<request>", format = "json")]
pub async fn send_reset_password_email(
    request: Json<EmailRequest>,
    users: Coll<User>,
    config: &State<Config>,
    mailer: &State<Mailer>,
) -> Result<Success> {
    let request = validated(request)?;

    let user = users
        .find_one(doc! { "email": &request.email }, None)
        .await?
        .ok_or(Error::UserNotFound)?;

    let token = Token::new(user.id, TokenPurpose::ResetPassword).encode(config);
    mailer.send(Email::reset_password(&user, &token)).await?;

    Ok(success())
}

#[post("/reset_password", data = "<request>", format = "json")]
pub async fn reset_password(
    request: Json<ResetPasswordRequest>,
    users: Coll<User>,
    config: &State<Config>,
) -> Result<Success> {
    let request = validated(request)?;

    let token = Token::decode(&request.token, TokenPurpose::ResetPassword, config)
        .map_err(|_| Error::InvalidResetPasswordToken)?;
    let password_hash = hash_password(&request.new_password)?;
    let update = doc! {
        "$set": { "password_hash": password_hash },
    };
    let result = users
        .update_one(token.user_id.as_doc(), update, None)
        .await?;
    if result.matched_count == 0 {
        return Err(Error::InvalidResetPasswordToken);
    }
    info!("Reset password of user {}", token.user_id);

    Ok(success())
}

#[post("/send_confirmation_email")]
pub async fn send_confirmation_email(
    current: Authenticated<UserRights>,
    config: &State<Config>,
    mailer: &State<Mailer>,
) -> Result<Success> {
    if current.email_confirmed {
        return Err(Error::EmailAlreadyConfirmed);
    }

    let token = Token::email_confirmation(current.id, &current.email).encode(config);
    mailer.send(Email::confirm_email(&current, &token)).await?;

    Ok(success())
}

#[post("/confirm_email", data = "<request>", format = "json")]
pub async fn confirm_email(
    request: Json<ConfirmEmailRequest>,
    users: Coll<User>,
    config: &State<Config>,
) -> Result<Success> {
    let request = validated(request)?;

    let token = Token::decode(&request.token, TokenPurpose::ConfirmEmail, config)
        .map_err(|_| Error::InvalidEmailConfirmationToken)?;
    let email = token.email.ok_or(Error::InvalidEmailConfirmationToken)?;
    // A token issued for an earlier address no longer matches.
    let result = users
        .update_one(
            doc! { "_id": token.user_id, "email": email },
            doc! { "$set": { "email_confirmed": true } },
            None,
        )
        .await?;
    if result.matched_count == 0 {
        return Err(Error::InvalidEmailConfirmationToken);
    }

    Ok(success())
}

#[cfg(test)]
mod tests {
    use mongodb::Database;
    use rocket::{
        http::{ContentType, Header, Status},
        local::asynchronous::{Client, LocalResponse},
        serde::json::{self, Value},
    };

    use super::*;
    use crate::mail::testing::Outbox;
    use crate::model::{common::group::Group, db::user::EXAMPLE_PASSWORD};

    async fn body_of(response: LocalResponse<'_>) -> Value {
        response.into_json::<Value>().await.unwrap()
    }

    async fn post_json(client: &Client, uri: String, body: Value) -> LocalResponse<'_> {
        client
            .post(uri)
            .header(ContentType::JSON)
            .body(body.to_string())
            .dispatch()
            .await
    }

    /// The token embedded in the body of the most recent email.
    fn token_from_last_email(client: &Client) -> String {
        let email = client.rocket().state::<Outbox>().unwrap().last().unwrap();
        email
            .body
            .lines()
            .find(|line| line.split('.').count() == 3 && !line.contains(' '))
            .unwrap()
            .to_string()
    }

    #[backend_test]
    async fn register_then_login(client: Client, users: Coll<User>) {
        let request = RegisterRequest::example();
        let response = post_json(&client, uri!("/api", register).to_string(), json::json!(request)).await;
        assert_eq!(response.status(), Status::Ok);
        let body = body_of(response).await;
        assert_eq!(body["status"], "success");
        assert!(body["access_token"].is_string());
        assert!(body["refresh_token"].is_string());

        // Stored with a hashed password and default state.
        let user = users
            .find_one(doc! { "username": &request.username }, None)
            .await
            .unwrap()
            .unwrap();
        assert_ne!(user.password_hash, request.password);
        assert_eq!(user.group, Group::User);
        assert_eq!(user.points, 0);

        // A welcome email went out.
        let outbox = client.rocket().state::<Outbox>().unwrap();
        let welcome = outbox.last().unwrap();
        assert_eq!(welcome.to, request.email);

        let response = post_json(
            &client,
            uri!("/api", login).to_string(),
            json::json!(LoginRequest::example_for(&request.username)),
        )
        .await;
        assert_eq!(response.status(), Status::Ok);
        assert!(response.cookies().get(AUTH_TOKEN_COOKIE).is_some());
    }

    #[backend_test]
    async fn register_rejects_taken_username_or_email(client: Client, users: Coll<User>) {
        let request = RegisterRequest::example();
        post_json(&client, uri!("/api", register).to_string(), json::json!(request)).await;

        let mut same_name = RegisterRequest::example_named("other");
        same_name.username = request.username.clone();
        let mut same_email = RegisterRequest::example_named("another");
        same_email.email = request.email.clone();

        for clash in [same_name, same_email] {
            let response =
                post_json(&client, uri!("/api", register).to_string(), json::json!(clash)).await;
            assert_eq!(response.status(), Status::NotFound);
            assert_eq!(body_of(response).await["error"]["code"], 101);
        }
        assert_eq!(users.count_documents(doc! {}, None).await.unwrap(), 2);
    }

    #[backend_test]
    async fn register_validates_fields(client: Client) {
        let response = post_json(
            &client,
            uri!("/api", register).to_string(),
            json::json!({ "email": "bad", "username": "has space", "password": "1" }),
        )
        .await;
        assert_eq!(response.status(), Status::BadRequest);
        let body = body_of(response).await;
        assert_eq!(body["error"]["code"], 3);
        let fields = &body["error"]["fields"];
        assert!(fields["email"].is_array());
        assert!(fields["username"].is_array());
        assert!(fields["password"].is_array());
    }

    #[backend_test]
    async fn login_failures(client: Client) {
        let response = post_json(
            &client,
            uri!("/api", login).to_string(),
            json::json!(LoginRequest::example_for("nobody")),
        )
        .await;
        assert_eq!(response.status(), Status::NotFound);
        assert_eq!(body_of(response).await["error"]["code"], 100);

        post_json(
            &client,
            uri!("/api", register).to_string(),
            json::json!(RegisterRequest::example()),
        )
        .await;
        let mut wrong = LoginRequest::example_for("carol");
        wrong.password = format!("{EXAMPLE_PASSWORD}!");
        let response = post_json(&client, uri!("/api", login).to_string(), json::json!(wrong)).await;
        assert_eq!(response.status(), Status::NotFound);
        assert_eq!(body_of(response).await["error"]["code"], 102);
    }

    #[backend_test]
    async fn refresh_issues_access_token(client: Client) {
        let response = post_json(
            &client,
            uri!("/api", register).to_string(),
            json::json!(RegisterRequest::example()),
        )
        .await;
        let tokens: AuthTokens = json::from_value(body_of(response).await).unwrap();

        // Access tokens don't refresh.
        let response = client
            .post(uri!("/api", refresh))
            .header(Header::new(
                "Authorization",
                format!("Bearer {}", tokens.access_token),
            ))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);

        let response = client
            .post(uri!("/api", refresh))
            .header(Header::new(
                "Authorization",
                format!("Bearer {}", tokens.refresh_token),
            ))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let access_token = body_of(response).await["access_token"]
            .as_str()
            .unwrap()
            .to_string();

        // The new access token works as a bearer token.
        client.delete(uri!("/api", logout)).dispatch().await;
        let response = client
            .post(uri!("/api", send_confirmation_email))
            .header(Header::new("Authorization", format!("Bearer {access_token}")))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
    }

    #[backend_test(user)]
    async fn logout_removes_cookie(client: Client) {
        let response = client.delete(uri!("/api", logout)).dispatch().await;
        assert_eq!(response.status(), Status::Ok);

        let response = client
            .post(uri!("/api", send_confirmation_email))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[backend_test(user)]
    async fn password_reset_flow(client: Client) {
        let response = post_json(
            &client,
            uri!("/api", send_reset_password_email).to_string(),
            json::json!({ "email": "user@example.com" }),
        )
        .await;
        assert_eq!(response.status(), Status::Ok);
        let token = token_from_last_email(&client);

        // A reset token is not a confirmation token.
        let response = post_json(
            &client,
            uri!("/api", confirm_email).to_string(),
            json::json!({ "token": token }),
        )
        .await;
        assert_eq!(response.status(), Status::Forbidden);
        assert_eq!(body_of(response).await["error"]["code"], 109);

        let response = post_json(
            &client,
            uri!("/api", reset_password).to_string(),
            json::json!({ "token": token, "new_password": "brand new password" }),
        )
        .await;
        assert_eq!(response.status(), Status::Ok);

        let response = post_json(
            &client,
            uri!("/api", login).to_string(),
            json::json!({ "email": "user@example.com", "password": "brand new password" }),
        )
        .await;
        assert_eq!(response.status(), Status::Ok);
    }

    #[backend_test]
    async fn password_reset_rejects_bad_tokens(client: Client) {
        let response = post_json(
            &client,
            uri!("/api", reset_password).to_string(),
            json::json!({ "token": "not.a.token", "new_password": "brand new password" }),
        )
        .await;
        assert_eq!(response.status(), Status::Forbidden);
        assert_eq!(body_of(response).await["error"]["code"], 108);

        // A well-formed token for a user that doesn't exist.
        let config = client.rocket().state::<Config>().unwrap();
        let token = Token::new(Id::new(), TokenPurpose::ResetPassword).encode(config);
        let response = post_json(
            &client,
            uri!("/api", reset_password).to_string(),
            json::json!({ "token": token, "new_password": "brand new password" }),
        )
        .await;
        assert_eq!(response.status(), Status::Forbidden);

        let response = post_json(
            &client,
            uri!("/api", send_reset_password_email).to_string(),
            json::json!({ "email": "nobody@example.com" }),
        )
        .await;
        assert_eq!(response.status(), Status::NotFound);
        assert_eq!(body_of(response).await["error"]["code"], 100);
    }

    #[backend_test(user)]
    async fn email_confirmation_flow(client: Client, db: Database) {
        let response = client
            .post(uri!("/api", send_confirmation_email))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let token = token_from_last_email(&client);

        for _ in 0..2 {
            // Confirming twice is harmless.
            let response = post_json(
                &client,
                uri!("/api", confirm_email).to_string(),
                json::json!({ "token": token }),
            )
            .await;
            assert_eq!(response.status(), Status::Ok);
        }
        let user = Coll::<User>::from_db(&db)
            .find_one(doc! { "username": "user" }, None)
            .await
            .unwrap()
            .unwrap();
        assert!(user.email_confirmed);

        let response = client
            .post(uri!("/api", send_confirmation_email))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);
        assert_eq!(body_of(response).await["error"]["code"], 107);
    }

    #[backend_test]
    async fn confirmation_token_is_bound_to_address(client: Client, users: Coll<User>) {
        let request = RegisterRequest::example();
        post_json(&client, uri!("/api", register).to_string(), json::json!(request)).await;
        let welcome_token = token_from_last_email(&client);
        post_json(
            &client,
            uri!("/api", login).to_string(),
            json::json!(LoginRequest::example_for(&request.username)),
        )
        .await;

        let response = client
            .put(format!("/api/users/{}/email", request.username))
            .header(ContentType::JSON)
            .body(json::json!({ "email": "moved@example.com" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let new_token = token_from_last_email(&client);

        // The welcome token confirmed the old address only.
        let response = post_json(
            &client,
            uri!("/api", confirm_email).to_string(),
            json::json!({ "token": welcome_token }),
        )
        .await;
        assert_eq!(response.status(), Status::Forbidden);
        assert_eq!(body_of(response).await["error"]["code"], 109);
        let user = users
            .find_one(doc! { "username": &request.username }, None)
            .await
            .unwrap()
            .unwrap();
        assert!(!user.email_confirmed);

        let response = post_json(
            &client,
            uri!("/api", confirm_email).to_string(),
            json::json!({ "token": new_token }),
        )
        .await;
        assert_eq!(response.status(), Status::Ok);
        let user = users
            .find_one(doc! { "username": &request.username }, None)
            .await
            .unwrap()
            .unwrap();
        assert!(user.email_confirmed);
    }

    #[backend_test(mail_fails)]
    async fn registration_survives_mail_failure(client: Client, users: Coll<User>) {
        let request = RegisterRequest::example();
        let response =
            post_json(&client, uri!("/api", register).to_string(), json::json!(request)).await;
        assert_eq!(response.status(), Status::Ok);
        assert!(body_of(response).await["access_token"].is_string());
        assert!(users
            .find_one(doc! { "username": &request.username }, None)
            .await
            .unwrap()
            .is_some());
    }

    #[backend_test(user, mail_fails)]
    async fn requested_mail_failure_is_reported(client: Client) {
        let response = post_json(
            &client,
            uri!("/api", send_reset_password_email).to_string(),
            json::json!({ "email": "user@example.com" }),
        )
        .await;
        assert_eq!(response.status(), Status::InternalServerError);
        assert_eq!(body_of(response).await["error"]["code"], 140);

        let response = client
            .post(uri!("/api", send_confirmation_email))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::InternalServerError);
        assert_eq!(body_of(response).await["error"]["code"], 140);
    }

    #[backend_test(user)]
    async fn banned_users_are_locked_out(client: Client, users: Coll<User>) {
        users
            .update_one(
                doc! { "username": "user" },
                doc! { "$set": { "banned": true } },
                None,
            )
            .await
            .unwrap();
        let response = client
            .post(uri!("/api", send_confirmation_email))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);
        assert_eq!(body_of(response).await["error"]["code"], 5);
    }
}
