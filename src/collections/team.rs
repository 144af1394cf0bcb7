//! Team members in `team.json`.

use super::{require_text, resolve_id, DataPaths};
use crate::errors::AppError;
use crate::models::{now_iso, CreateMemberRequest, TeamMember, UpdateMemberRequest};
use crate::sync::{CollectionSync, PathLocks};

#[derive(Clone)]
pub struct TeamApi {
    sync: CollectionSync,
    locks: PathLocks,
    path: String,
}

impl TeamApi {
    pub fn new(sync: CollectionSync, locks: PathLocks, paths: &DataPaths) -> Self {
        Self {
            sync,
            locks,
            path: paths.team(),
        }
    }

    pub async fn list(&self) -> Result<Vec<TeamMember>, AppError> {
        Ok(self.sync.read_or_cached::<Vec<TeamMember>>(&self.path).await?.items)
    }

    pub async fn get(&self, id: &str) -> Result<TeamMember, AppError> {
        self.list()
            .await?
            .into_iter()
            .find(|m| m.id == id)
            .ok_or_else(|| not_found(id))
    }

    pub async fn create(&self, request: CreateMemberRequest) -> Result<TeamMember, AppError> {
        require_text("name", &request.name)?;
        let id = resolve_id(request.id.as_deref())?;
        let now = now_iso();

        let member = TeamMember {
            id: id.clone(),
            name: request.name.trim().to_string(),
            role: request.role,
            email: request.email,
            avatar_url: request.avatar_url,
            created_at: Some(now.clone()),
            updated_at: Some(now),
            extra: Default::default(),
        };

        let message = format!("feat(team): add {} ({})", member.name, member.id);
        let _guard = self.locks.lock(&self.path).await;
        let candidate = member.clone();
        self.sync
            .mutate(&self.path, &message, move |mut members: Vec<TeamMember>| {
                if members.iter().any(|m| m.id == candidate.id) {
                    return Err(AppError::DuplicateId(format!("Duplicate id: {}", candidate.id)));
                }
                members.push(candidate.clone());
                Ok(members)
            })
            .await?;

        tracing::info!(id = %id, "team member created");
        Ok(member)
    }

    pub async fn update(&self, id: &str, patch: UpdateMemberRequest) -> Result<TeamMember, AppError> {
        if let Some(name) = &patch.name {
            require_text("name", name)?;
        }
        let now = now_iso();

        let message = format!("chore(team): update {id}");
        let _guard = self.locks.lock(&self.path).await;
        let outcome = self
            .sync
            .mutate(&self.path, &message, |mut members: Vec<TeamMember>| {
                let member = members
                    .iter_mut()
                    .find(|m| m.id == id)
                    .ok_or_else(|| not_found(id))?;
                patch.apply(member);
                member.updated_at = Some(now.clone());
                Ok(members)
            })
            .await?;

        outcome
            .items
            .into_iter()
            .find(|m| m.id == id)
            .ok_or_else(|| not_found(id))
    }

    pub async fn remove(&self, id: &str) -> Result<(), AppError> {
        let message = format!("chore(team): remove {id}");
        let _guard = self.locks.lock(&self.path).await;
        self.sync
            .mutate(&self.path, &message, |mut members: Vec<TeamMember>| {
                let before = members.len();
                members.retain(|m| m.id != id);
                if members.len() == before {
                    return Err(not_found(id));
                }
                Ok(members)
            })
            .await?;
        tracing::info!(id, "team member removed");
        Ok(())
    }
}

fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Team member {id} not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::testing::{harness, Harness};
    use crate::store::BlobStore;

    fn api(h: &Harness) -> TeamApi {
        TeamApi::new(h.sync.clone(), PathLocks::new(), &DataPaths::new("public/data"))
    }

    fn anna() -> CreateMemberRequest {
        CreateMemberRequest {
            id: Some("anna".to_string()),
            name: "Anna".to_string(),
            role: Some("dev".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_into_empty_repo() {
        let h = harness().await;
        let team = api(&h);

        let member = team.create(anna()).await.unwrap();
        assert_eq!(member.created_at, member.updated_at);

        let members = team.list().await.unwrap();
        assert_eq!(members, vec![member]);

        let blob = h.store.get("public/data/team.json").await.unwrap();
        assert!(blob.content.contains("\"name\": \"Anna\""));
    }

    #[tokio::test]
    async fn test_list_falls_back_to_mirror_when_offline() {
        let h = harness().await;
        let member = api(&h).create(anna()).await.unwrap();

        let offline = TeamApi::new(h.offline(), PathLocks::new(), &DataPaths::new("public/data"));
        assert_eq!(offline.list().await.unwrap(), vec![member.clone()]);
        assert_eq!(offline.get(&member.id).await.unwrap(), member);
        assert!(matches!(
            offline.create(anna()).await,
            Err(AppError::Transport { .. })
        ));
    }

    #[tokio::test]
    async fn test_generated_ids_are_uuids() {
        let h = harness().await;
        let team = api(&h);

        let member = team
            .create(CreateMemberRequest {
                name: "Bob".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(uuid::Uuid::parse_str(&member.id).is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_id_leaves_collection_unchanged() {
        let h = harness().await;
        let team = api(&h);
        team.create(anna()).await.unwrap();
        let writes = h.store.write_count();

        let err = team.create(anna()).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateId(_)));
        assert_eq!(h.store.write_count(), writes);
        assert_eq!(team.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_validation_runs_before_any_io() {
        let h = harness().await;
        let team = api(&h);

        let err = team
            .create(CreateMemberRequest {
                name: "  ".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = team
            .create(CreateMemberRequest {
                id: Some("".to_string()),
                name: "X".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(h.store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_update_merges_patch() {
        let h = harness().await;
        let team = api(&h);
        let created = team.create(anna()).await.unwrap();

        let updated = team
            .update(
                "anna",
                UpdateMemberRequest {
                    email: Some("anna@example.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Anna");
        assert_eq!(updated.role.as_deref(), Some("dev"));
        assert_eq!(updated.email.as_deref(), Some("anna@example.com"));
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(team.get("anna").await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_update_and_remove_missing_member() {
        let h = harness().await;
        let team = api(&h);
        team.create(anna()).await.unwrap();
        let writes = h.store.write_count();

        let err = team.update("ghost", UpdateMemberRequest::default()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = team.remove("ghost").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(h.store.write_count(), writes);
    }

    #[tokio::test]
    async fn test_remove() {
        let h = harness().await;
        let team = api(&h);
        team.create(anna()).await.unwrap();

        team.remove("anna").await.unwrap();
        assert!(team.list().await.unwrap().is_empty());
        assert!(matches!(team.get("anna").await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_unknown_fields_survive_updates() {
        let h = harness().await;
        h.store
            .seed(
                "public/data/team.json",
                "[\n  {\n    \"id\": \"anna\",\n    \"name\": \"Anna\",\n    \"timezone\": \"UTC+3\"\n  }\n]\n",
            )
            .await;
        let team = api(&h);

        team.update(
            "anna",
            UpdateMemberRequest {
                role: Some("lead".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let blob = h.store.get("public/data/team.json").await.unwrap();
        assert!(blob.content.contains("\"timezone\": \"UTC+3\""));
    }
}
