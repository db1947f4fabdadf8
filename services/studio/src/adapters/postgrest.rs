//! services/studio/src/adapters/postgrest.rs
//!
//! This module contains the table adapter, the concrete implementation of the
//! `DatabaseService` port from the `core` crate. It talks to the hosted
//! backend's PostgREST endpoint as the signed-in user; row-level security on
//! the backend decides what that user may see and change.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use sonicwave_core::domain::{
    NewProfile, NewProject, NewProjectAudio, Profile, Project, ProjectAudio, ProjectChanges,
    SubscriptionTier,
};
use sonicwave_core::ports::{DatabaseService, PortError, PortResult};

use super::supabase::{ensure_success, SupabaseClient, SupabaseError};

const PROFILES: &str = "/rest/v1/user_profiles";
const PROJECTS: &str = "/rest/v1/projects";
const PROJECT_AUDIO: &str = "/rest/v1/project_audio";

/// Single-row mode: zero rows come back as `PGRST116`.
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A table adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct PostgrestAdapter {
    client: SupabaseClient,
}

impl PostgrestAdapter {
    /// Creates a new `PostgrestAdapter`.
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> PortResult<T> {
        let response = request
            .send()
            .await
            .map_err(|e| SupabaseError::from(e).into_port())?;
        ensure_success(response)
            .await
            .map_err(SupabaseError::into_port)?
            .json::<T>()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }

    async fn execute(&self, request: RequestBuilder) -> PortResult<()> {
        let response = request
            .send()
            .await
            .map_err(|e| SupabaseError::from(e).into_port())?;
        ensure_success(response)
            .await
            .map_err(SupabaseError::into_port)?;
        Ok(())
    }

    /// A request for exactly one row of `table`.
    async fn single(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, table)
            .await
            .header("Accept", SINGLE_OBJECT)
    }

    /// An insert that returns the created row.
    async fn insert(&self, table: &str, row: &impl Serialize) -> RequestBuilder {
        self.single(Method::POST, table)
            .await
            .header("Prefer", "return=representation")
            .json(row)
    }
}

fn eq(id: Uuid) -> String {
    format!("eq.{}", id)
}

//=========================================================================================
// "Impure" Table Record Structs
//=========================================================================================

#[derive(Deserialize)]
struct ProfileRecord {
    id: Uuid,
    full_name: Option<String>,
    subscription_tier: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ProfileRecord {
    fn to_domain(self) -> Profile {
        let subscription_tier = match self.subscription_tier.as_deref() {
            None => SubscriptionTier::Free,
            Some(raw) => raw.parse::<SubscriptionTier>().unwrap_or_else(|e| {
                warn!("Profile {} has {}; treating it as free", self.id, e);
                SubscriptionTier::Free
            }),
        };
        Profile {
            id: self.id,
            full_name: self.full_name,
            subscription_tier,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Deserialize)]
struct ProjectRecord {
    id: Uuid,
    user_id: Uuid,
    title: String,
    description: Option<String>,
    content: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ProjectRecord {
    fn to_domain(self) -> Project {
        Project {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            description: self.description,
            content: self.content.unwrap_or_default(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Deserialize)]
struct ProjectAudioRecord {
    id: Uuid,
    project_id: Uuid,
    voice_id: String,
    audio_url: String,
    created_at: DateTime<Utc>,
}
impl ProjectAudioRecord {
    fn to_domain(self) -> ProjectAudio {
        ProjectAudio {
            id: self.id,
            project_id: self.project_id,
            voice_id: self.voice_id,
            audio_url: self.audio_url,
            created_at: self.created_at,
        }
    }
}

#[derive(Serialize)]
struct ProfileInsert<'a> {
    id: Uuid,
    full_name: Option<&'a str>,
}

#[derive(Serialize)]
struct ProjectWrite<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<Uuid>,
    title: &'a str,
    description: Option<&'a str>,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct AudioInsert<'a> {
    id: Uuid,
    project_id: Uuid,
    voice_id: &'a str,
    audio_url: &'a str,
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for PostgrestAdapter {
    async fn get_profile(&self, id: Uuid) -> PortResult<Profile> {
        let request = self
            .single(Method::GET, PROFILES)
            .await
            .query(&[("select", "*".to_string()), ("id", eq(id))]);
        let record: ProfileRecord = self.send(request).await?;
        Ok(record.to_domain())
    }

    async fn create_profile(&self, profile: NewProfile) -> PortResult<Profile> {
        let row = ProfileInsert {
            id: profile.id,
            full_name: profile.full_name.as_deref(),
        };
        let record: ProfileRecord = self.send(self.insert(PROFILES, &row).await).await?;
        Ok(record.to_domain())
    }

    async fn update_profile_name(&self, id: Uuid, full_name: Option<&str>) -> PortResult<()> {
        let request = self
            .client
            .request(Method::PATCH, PROFILES)
            .await
            .query(&[("id", eq(id))])
            .json(&serde_json::json!({
                "full_name": full_name,
                "updated_at": Utc::now(),
            }));
        self.execute(request).await
    }

    async fn list_projects(&self) -> PortResult<Vec<Project>> {
        let request = self
            .client
            .request(Method::GET, PROJECTS)
            .await
            .query(&[("select", "*"), ("order", "created_at.desc")]);
        let records: Vec<ProjectRecord> = self.send(request).await?;
        Ok(records.into_iter().map(ProjectRecord::to_domain).collect())
    }

    async fn get_project(&self, id: Uuid) -> PortResult<Project> {
        let request = self
            .single(Method::GET, PROJECTS)
            .await
            .query(&[("select", "*".to_string()), ("id", eq(id))]);
        let record: ProjectRecord = self.send(request).await?;
        Ok(record.to_domain())
    }

    async fn create_project(&self, project: NewProject) -> PortResult<Project> {
        let row = ProjectWrite {
            user_id: Some(project.user_id),
            title: &project.title,
            description: project.description.as_deref(),
            content: &project.content,
            updated_at: None,
        };
        let record: ProjectRecord = self.send(self.insert(PROJECTS, &row).await).await?;
        Ok(record.to_domain())
    }

    async fn update_project(&self, id: Uuid, changes: ProjectChanges) -> PortResult<()> {
        let row = ProjectWrite {
            user_id: None,
            title: &changes.title,
            description: changes.description.as_deref(),
            content: &changes.content,
            updated_at: Some(changes.updated_at),
        };
        let request = self
            .client
            .request(Method::PATCH, PROJECTS)
            .await
            .query(&[("id", eq(id))])
            .json(&row);
        self.execute(request).await
    }

    async fn delete_project(&self, id: Uuid) -> PortResult<()> {
        let request = self
            .client
            .request(Method::DELETE, PROJECTS)
            .await
            .query(&[("id", eq(id))]);
        self.execute(request).await
    }

    async fn latest_project_audio(&self, project_id: Uuid) -> PortResult<Option<ProjectAudio>> {
        let request = self
            .client
            .request(Method::GET, PROJECT_AUDIO)
            .await
            .query(&[
                ("select", "*".to_string()),
                ("project_id", eq(project_id)),
                ("order", "created_at.desc".to_string()),
                ("limit", "1".to_string()),
            ]);
        let records: Vec<ProjectAudioRecord> = self.send(request).await?;
        Ok(records.into_iter().next().map(ProjectAudioRecord::to_domain))
    }

    async fn create_project_audio(&self, audio: NewProjectAudio) -> PortResult<ProjectAudio> {
        let row = AudioInsert {
            id: audio.id,
            project_id: audio.project_id,
            voice_id: &audio.voice_id,
            audio_url: &audio.audio_url,
        };
        let record: ProjectAudioRecord = self.send(self.insert(PROJECT_AUDIO, &row).await).await?;
        Ok(record.to_domain())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use reqwest::Url;
    use serde_json::json;

    const U1: &str = "00000000-0000-0000-0000-0000000000a1";

    fn adapter(server: &Server) -> PostgrestAdapter {
        let url = Url::parse(&server.url()).unwrap();
        PostgrestAdapter::new(SupabaseClient::new(reqwest::Client::new(), &url, "anon-key"))
    }

    fn project_json(id: &str, title: &str, created_at: &str) -> serde_json::Value {
        json!({
            "id": id,
            "user_id": U1,
            "title": title,
            "description": null,
            "content": "text",
            "created_at": created_at,
            "updated_at": created_at
        })
    }

    #[tokio::test]
    async fn missing_profile_is_not_found() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", PROFILES)
            .match_query(Matcher::UrlEncoded("id".into(), format!("eq.{}", U1)))
            .match_header("accept", SINGLE_OBJECT)
            .match_header("apikey", "anon-key")
            .match_header("authorization", "Bearer anon-key")
            .with_status(406)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"code":"PGRST116","details":"The result contains 0 rows","hint":null,"message":"JSON object requested, multiple (or no) rows returned"}"#,
            )
            .create_async()
            .await;

        let err = adapter(&server)
            .get_profile(Uuid::parse_str(U1).unwrap())
            .await
            .unwrap_err();
        mock.assert_async().await;
        assert!(err.is_not_found());
        assert_eq!(
            err.message(),
            "JSON object requested, multiple (or no) rows returned"
        );
    }

    #[tokio::test]
    async fn duplicate_profile_insert_is_a_conflict() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", PROFILES)
            .match_header("prefer", "return=representation")
            .match_body(Matcher::Json(json!({ "id": U1, "full_name": null })))
            .with_status(409)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"code":"23505","details":"Key (id)=(...) already exists.","hint":null,"message":"duplicate key value violates unique constraint \"user_profiles_pkey\""}"#,
            )
            .create_async()
            .await;

        let err = adapter(&server)
            .create_profile(NewProfile {
                id: Uuid::parse_str(U1).unwrap(),
                full_name: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Conflict(_)));
    }

    #[tokio::test]
    async fn created_profile_defaults_to_free() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", PROFILES)
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "id": U1,
                    "full_name": null,
                    "subscription_tier": "free",
                    "created_at": "2024-03-01T10:00:00.123456+00:00",
                    "updated_at": "2024-03-01T10:00:00.123456+00:00"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let profile = adapter(&server)
            .create_profile(NewProfile {
                id: Uuid::parse_str(U1).unwrap(),
                full_name: None,
            })
            .await
            .unwrap();
        assert_eq!(profile.subscription_tier, SubscriptionTier::Free);
        assert_eq!(profile.id.to_string(), U1);
    }

    #[tokio::test]
    async fn projects_are_requested_newest_first() {
        let mut server = Server::new_async().await;
        let body = json!([
            project_json("00000000-0000-0000-0000-000000000003", "newest", "2024-03-03T00:00:00Z"),
            project_json("00000000-0000-0000-0000-000000000001", "oldest", "2024-03-01T00:00:00Z"),
        ]);
        let mock = server
            .mock("GET", PROJECTS)
            .match_query(Matcher::UrlEncoded("order".into(), "created_at.desc".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let projects = adapter(&server).list_projects().await.unwrap();
        mock.assert_async().await;
        let titles: Vec<_> = projects.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, ["newest", "oldest"]);
    }

    #[tokio::test]
    async fn row_level_security_is_unauthorized() {
        let mut server = Server::new_async().await;
        server
            .mock("DELETE", PROJECTS)
            .match_query(Matcher::Any)
            .with_status(403)
            .with_header("content-type", "application/json")
            .with_body(r#"{"code":"42501","message":"permission denied for table projects"}"#)
            .create_async()
            .await;

        let err = adapter(&server).delete_project(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(
            err,
            PortError::Unauthorized("permission denied for table projects".into())
        );
    }

    #[tokio::test]
    async fn latest_audio_asks_for_one_row() {
        let mut server = Server::new_async().await;
        let project_id = Uuid::new_v4();
        server
            .mock("GET", PROJECT_AUDIO)
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("project_id".into(), format!("eq.{}", project_id)),
                Matcher::UrlEncoded("order".into(), "created_at.desc".into()),
                Matcher::UrlEncoded("limit".into(), "1".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("[]")
            .create_async()
            .await;

        let audio = adapter(&server).latest_project_audio(project_id).await.unwrap();
        assert!(audio.is_none());
    }

    #[tokio::test]
    async fn update_writes_the_editable_fields() {
        let mut server = Server::new_async().await;
        let id = Uuid::new_v4();
        let mock = server
            .mock("PATCH", PROJECTS)
            .match_query(Matcher::UrlEncoded("id".into(), format!("eq.{}", id)))
            .match_body(Matcher::PartialJson(json!({
                "title": "Chapter 1",
                "description": null,
                "content": "Once upon a time"
            })))
            .with_status(204)
            .create_async()
            .await;

        adapter(&server)
            .update_project(
                id,
                ProjectChanges {
                    title: "Chapter 1".into(),
                    description: None,
                    content: "Once upon a time".into(),
                    updated_at: Utc::now(),
                },
            )
            .await
            .unwrap();
        mock.assert_async().await;
    }
}
