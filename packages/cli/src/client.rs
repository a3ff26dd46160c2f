use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

const SESSION_COOKIE: &str = "access_token";

#[derive(Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

#[derive(Debug, Deserialize)]
pub struct InitiatedUpload {
    pub id: i32,
    pub url: String,
    pub key: String,
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct Image {
    pub id: i32,
    pub name: String,
    pub oss_key: String,
    pub file_size: i64,
    pub created_at: DateTime<Utc>,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    pub page: u64,
    pub total: u64,
    pub total_pages: u64,
}

#[derive(Debug, Deserialize)]
pub struct ImageList {
    pub data: Vec<Image>,
    pub pagination: Pagination,
}

/// Blocking client for the `/api/v1` surface.
pub struct ApiClient {
    http: Client,
    base: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(server: &str, token: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base: format!("{}/api/v1", server.trim_end_matches('/')),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn authed(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        let token = self
            .token
            .as_deref()
            .context("Not signed in: pass --token or set IMGOOD_TOKEN")?;
        Ok(req.header(AUTHORIZATION, format!("Bearer {token}")))
    }

    /// Sign in and return the session token from the cookie the server sets.
    pub fn sign_in(&self, email: &str, password: &str) -> Result<String> {
        let res = self
            .http
            .post(self.url("/auth/sign-in"))
            .form(&[("email", email), ("password", password)])
            .send()
            .context("Sign-in request failed")?;

        if !res.status().is_redirection() {
            return Err(api_error(res));
        }

        let cookies = res.headers().get_all(SET_COOKIE);
        session_token(cookies.iter().filter_map(|v| v.to_str().ok()))
            .context("Server did not return a session cookie")
    }

    /// End the session on the server. The server clears its cookie either way.
    pub fn sign_out(&self, token: &str) -> Result<()> {
        let res = self
            .http
            .get(self.url("/auth/sign-out"))
            .header(COOKIE, format!("{SESSION_COOKIE}={token}"))
            .send()
            .context("Sign-out request failed")?;
        if !res.status().is_redirection() && !res.status().is_success() {
            return Err(api_error(res));
        }
        Ok(())
    }

    pub fn initiate_upload(&self, name: &str, hash: &str, size: u64) -> Result<InitiatedUpload> {
        let req = self
            .http
            .post(self.url("/images/uploads"))
            .json(&json!({ "name": name, "hash": hash, "size": size }));
        json_response(self.authed(req)?.send()?)
    }

    /// `PUT` the bytes to a pre-signed URL with the headers it was signed with.
    pub fn put_object(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        body: Vec<u8>,
    ) -> Result<()> {
        let mut req = self.http.put(url).body(body);
        for (name, value) in headers {
            req = req.header(name.as_str(), value.as_str());
        }
        let res = req.send().context("Upload to storage failed")?;
        if !res.status().is_success() {
            bail!(
                "Storage rejected the upload with status {}: {}",
                res.status(),
                res.text().unwrap_or_default()
            );
        }
        Ok(())
    }

    pub fn confirm_upload(&self, id: i32) -> Result<Image> {
        let req = self.http.post(self.url(&format!("/images/{id}/confirm")));
        json_response(self.authed(req)?.send()?)
    }

    pub fn list_images(
        &self,
        page: u64,
        per_page: u64,
        prefix: Option<&str>,
    ) -> Result<ImageList> {
        let mut req = self
            .http
            .get(self.url("/images"))
            .query(&[("page", page), ("per_page", per_page)]);
        if let Some(prefix) = prefix {
            req = req.query(&[("prefix", prefix)]);
        }
        json_response(self.authed(req)?.send()?)
    }

    /// Confirmed image stored under exactly `key`.
    pub fn find_by_key(&self, key: &str) -> Result<Image> {
        let mut page = 1;
        loop {
            let list = self.list_images(page, 100, Some(key))?;
            if let Some(image) = list.data.into_iter().find(|image| image.oss_key == key) {
                return Ok(image);
            }
            if page >= list.pagination.total_pages {
                bail!("No image with key {key}");
            }
            page += 1;
        }
    }

    /// Fetch public object bytes.
    pub fn download(&self, url: &str) -> Result<Vec<u8>> {
        let res = self.http.get(url).send().context("Download failed")?;
        if !res.status().is_success() {
            bail!("Download of {url} failed with status {}", res.status());
        }
        Ok(res.bytes().context("Download failed")?.to_vec())
    }

    pub fn delete_image(&self, key: &str) -> Result<()> {
        let req = self
            .http
            .post(self.url("/images/delete"))
            .json(&json!({ "oss_key": key }));
        let res = self.authed(req)?.send()?;
        if res.status() != StatusCode::OK {
            return Err(api_error(res));
        }
        Ok(())
    }
}

/// Session token from the `Set-Cookie` values of a sign-in response.
fn session_token<'a>(set_cookies: impl IntoIterator<Item = &'a str>) -> Option<String> {
    set_cookies
        .into_iter()
        .filter_map(|v| v.split(';').next())
        .find_map(|pair| pair.trim().strip_prefix(SESSION_COOKIE)?.strip_prefix('='))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

fn json_response<T: DeserializeOwned>(res: Response) -> Result<T> {
    if !res.status().is_success() {
        return Err(api_error(res));
    }
    res.json().context("Unexpected response body")
}

fn api_error(res: Response) -> anyhow::Error {
    let status = res.status();
    match res.json::<ErrorBody>() {
        Ok(body) => anyhow::anyhow!("{} ({}): {}", body.code, status, body.message),
        Err(_) => anyhow::anyhow!("Request failed with status {status}"),
    }
}
