use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::ImageStatus;
use common::storage::{ObjectInfo, ObjectStore, StorageError};
use reqwest::Client;
use reqwest::header::HeaderMap;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait,
    QueryFilter, Set,
};
use serde_json::Value;
use uuid::Uuid;

use server::config::{
    AppConfig, AuthConfig, CorsConfig, DatabaseConfig, ServerConfig, StorageConfig, UploadConfig,
};
use server::entity::image;
use server::identity::{IdentityError, IdentityProvider, Session};
use server::state::AppState;
use server::utils::jwt;

pub const JWT_SECRET: &str = "test-secret-for-integration-tests";
pub const JWT_AUDIENCE: &str = "authenticated";
pub const STORAGE_SECRET: &str = "storage-secret-never-exposed";

pub const VALID_EMAIL: &str = "alice@example.com";
pub const VALID_PASSWORD: &str = "correct-password";
/// Signing in with this email makes the fake identity service fail.
pub const UNAVAILABLE_EMAIL: &str = "down@example.com";

pub mod routes {
    pub const SIGN_IN: &str = "/api/v1/auth/sign-in";
    pub const SIGN_OUT: &str = "/api/v1/auth/sign-out";
    pub const ME: &str = "/api/v1/auth/me";
    pub const AUTH_CONFIG: &str = "/api/v1/auth/config";
    pub const IMAGES: &str = "/api/v1/images";
    pub const UPLOADS: &str = "/api/v1/images/uploads";
    pub const DELETE: &str = "/api/v1/images/delete";

    pub fn image(id: i32) -> String {
        format!("/api/v1/images/{id}")
    }

    pub fn confirm(id: i32) -> String {
        format!("/api/v1/images/{id}/confirm")
    }
}

/// One `presign_upload` call seen by [`FakeObjectStore`].
#[derive(Debug, Clone)]
pub struct PresignCall {
    pub key: String,
    pub content_disposition: String,
    pub expiry_secs: u32,
}

/// In-memory object store that records what the server asks of it.
#[derive(Default)]
pub struct FakeObjectStore {
    objects: Mutex<HashMap<String, u64>>,
    presigned: Mutex<Vec<PresignCall>>,
    deletes: AtomicUsize,
    fail_presign: AtomicBool,
    fail_head: AtomicBool,
    fail_delete: AtomicBool,
}

impl FakeObjectStore {
    /// Simulate a client finishing its `PUT`.
    pub fn put_object(&self, key: &str, size: u64) {
        self.objects.lock().unwrap().insert(key.to_string(), size);
    }

    pub fn has_object(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn presign_calls(&self) -> Vec<PresignCall> {
        self.presigned.lock().unwrap().clone()
    }

    pub fn delete_calls(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn fail_presign(&self, fail: bool) {
        self.fail_presign.store(fail, Ordering::SeqCst);
    }

    pub fn fail_head(&self, fail: bool) {
        self.fail_head.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn presign_upload(
        &self,
        key: &str,
        content_disposition: &str,
        expiry_secs: u32,
    ) -> Result<String, StorageError> {
        if self.fail_presign.load(Ordering::SeqCst) {
            return Err(StorageError::Request("signing service down".into()));
        }
        self.presigned.lock().unwrap().push(PresignCall {
            key: key.to_string(),
            content_disposition: content_disposition.to_string(),
            expiry_secs,
        });
        Ok(format!(
            "https://pics.storage.test/{key}?X-Amz-Expires={expiry_secs}&X-Amz-Signature=fake"
        ))
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectInfo>, StorageError> {
        if self.fail_head.load(Ordering::SeqCst) {
            return Err(StorageError::UnexpectedStatus {
                operation: "head",
                status: 503,
            });
        }
        Ok(self
            .objects
            .lock()
            .unwrap()
            .get(key)
            .map(|&size| ObjectInfo { size: Some(size) }))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(StorageError::UnexpectedStatus {
                operation: "delete",
                status: 500,
            });
        }
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Identity service that knows a single account.
pub struct FakeIdentity {
    pub user_id: Uuid,
    sign_outs: AtomicUsize,
}

impl FakeIdentity {
    fn new() -> Self {
        Self {
            user_id: Uuid::new_v4(),
            sign_outs: AtomicUsize::new(0),
        }
    }

    pub fn sign_out_calls(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        if email == UNAVAILABLE_EMAIL {
            return Err(IdentityError::Unavailable("connection refused".into()));
        }
        if email != VALID_EMAIL || password != VALID_PASSWORD {
            return Err(IdentityError::InvalidCredentials);
        }
        let access_token = jwt::sign(
            self.user_id,
            Some(email),
            JWT_SECRET,
            JWT_AUDIENCE,
            chrono::Duration::hours(1),
        )
        .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        Ok(Session {
            access_token,
            expires_in: 3600,
            user_id: self.user_id.to_string(),
            email: Some(email.to_string()),
        })
    }

    async fn sign_out(&self, _access_token: &str) -> Result<(), IdentityError> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors: CorsConfig::default(),
        },
        database: DatabaseConfig {
            url: "sqlite::memory:".to_string(),
        },
        auth: AuthConfig {
            jwt_secret: JWT_SECRET.to_string(),
            jwt_audience: JWT_AUDIENCE.to_string(),
            identity_url: "https://identity.test".to_string(),
            identity_public_key: "public-anon-key".to_string(),
            session_cookie: "access_token".to_string(),
            cookie_secure: false,
        },
        storage: StorageConfig {
            domain: "storage.test".to_string(),
            endpoint: None,
            region: "test-1".to_string(),
            access_key_id: "test-access-key".to_string(),
            secret_access_key: STORAGE_SECRET.to_string(),
            bucket: "pics".to_string(),
            path_style: false,
            presign_ttl_secs: 300,
            key_suffix_len: 6,
            thumbnail_query: "w=50&h=50&mode=clip".to_string(),
        },
        upload: UploadConfig::default(),
    }
}

/// A running test server.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub db: DatabaseConnection,
    pub store: Arc<FakeObjectStore>,
    pub identity: Arc<FakeIdentity>,
    pub config: AppConfig,
}

/// Parsed HTTP response for test assertions.
pub struct TestResponse {
    pub status: u16,
    pub headers: HeaderMap,
    /// Raw response body as text.
    pub text: String,
    /// Parsed JSON body, or `Null` if the response is not valid JSON.
    pub body: Value,
}

/// Fresh in-memory database with the schema applied.
pub async fn test_db() -> DatabaseConnection {
    // Every SQLite in-memory connection is its own database, so the pool is
    // pinned to a single connection.
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(opts)
        .await
        .expect("Failed to open in-memory database");
    server::database::ensure_schema(&db)
        .await
        .expect("Failed to create schema");
    db
}

impl TestApp {
    pub async fn spawn() -> Self {
        let db = test_db().await;
        let store = Arc::new(FakeObjectStore::default());
        let identity = Arc::new(FakeIdentity::new());
        let config = test_config();

        let state = AppState {
            db: db.clone(),
            config: config.clone(),
            object_store: store.clone(),
            identity: identity.clone(),
        };

        let app = server::build_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to build HTTP client");

        Self {
            addr,
            client,
            db,
            store,
            identity,
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Session token for `user_id`, as the identity service would issue it.
    pub fn token_for(&self, user_id: Uuid) -> String {
        jwt::sign(
            user_id,
            None,
            JWT_SECRET,
            JWT_AUDIENCE,
            chrono::Duration::hours(1),
        )
        .expect("Failed to sign test token")
    }

    /// A fresh user id and a token for it.
    pub fn new_user(&self) -> (Uuid, String) {
        let user_id = Uuid::new_v4();
        (user_id, self.token_for(user_id))
    }

    pub async fn post_with_token(&self, path: &str, body: &Value, token: &str) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .json(body)
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn post_without_token(&self, path: &str, body: &Value) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn post_form(
        &self,
        path: &str,
        form: &[(&str, &str)],
        token: Option<&str>,
    ) -> TestResponse {
        let mut req = self.client.post(self.url(path)).form(form);
        if let Some(token) = token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        let res = req.send().await.expect("Failed to send form POST request");

        TestResponse::from_response(res).await
    }

    pub async fn get_with_token(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    pub async fn get_with_cookie(&self, path: &str, cookie: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .header("Cookie", cookie)
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    pub async fn get_without_token(&self, path: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    /// Start an upload through the API and return the response.
    pub async fn initiate_upload(&self, token: &str, name: &str, content: &[u8]) -> TestResponse {
        self.post_with_token(
            routes::UPLOADS,
            &serde_json::json!({
                "name": name,
                "hash": hash_of(content),
                "size": content.len(),
            }),
            token,
        )
        .await
    }

    /// Run the full upload flow: initiate, store the object, confirm.
    pub async fn upload_image(&self, token: &str, name: &str, content: &[u8]) -> TestResponse {
        let init = self.initiate_upload(token, name, content).await;
        assert_eq!(init.status, 201, "initiate_upload failed: {}", init.text);

        let key = init.body["key"].as_str().expect("key in response");
        self.store.put_object(key, content.len() as u64);

        let res = self
            .post_with_token(&routes::confirm(init.id()), &serde_json::json!({}), token)
            .await;
        assert_eq!(res.status, 200, "confirm_upload failed: {}", res.text);
        res
    }

    /// Insert a record directly, bypassing the API.
    pub async fn insert_image(
        &self,
        user_id: Uuid,
        key: &str,
        content: &[u8],
        status: ImageStatus,
        created_at: DateTime<Utc>,
    ) -> image::Model {
        insert_image(&self.db, user_id, key, content, status, created_at).await
    }

    pub async fn find_image(&self, key: &str) -> Option<image::Model> {
        image::Entity::find()
            .filter(image::Column::OssKey.eq(key))
            .one(&self.db)
            .await
            .expect("DB query failed")
    }

    pub async fn image_count(&self) -> usize {
        image::Entity::find()
            .all(&self.db)
            .await
            .expect("DB query failed")
            .len()
    }
}

pub async fn insert_image(
    db: &DatabaseConnection,
    user_id: Uuid,
    key: &str,
    content: &[u8],
    status: ImageStatus,
    created_at: DateTime<Utc>,
) -> image::Model {
    image::ActiveModel {
        name: Set(format!("{key}.png")),
        user_id: Set(user_id),
        oss_key: Set(key.to_string()),
        hash: Set(hash_of(content)),
        file_size: Set(content.len() as i64),
        confirmed_at: Set((status == ImageStatus::Confirmed).then_some(created_at)),
        status: Set(status),
        created_at: Set(created_at),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to insert image")
}

pub fn hash_of(content: &[u8]) -> String {
    common::ContentHash::compute(content).to_hex()
}

impl TestResponse {
    pub async fn from_response(res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let headers = res.headers().clone();
        let text = res.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Self {
            status,
            headers,
            text,
            body,
        }
    }

    pub fn id(&self) -> i32 {
        self.body["id"]
            .as_i64()
            .expect("response body should contain 'id'") as i32
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}
