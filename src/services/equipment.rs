//! Equipment service: listing, writes with characteristic values, passport scans

use std::sync::Arc;

use crate::{
    blobs::{self, BlobStore},
    catalog::{ListSpec, SchemaPolicy},
    config::CatalogConfig,
    error::{AppError, AppResult},
    models::{
        equipment::{EquipmentInput, EquipmentPage, EquipmentQuery},
        EquipmentDetail,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct EquipmentService {
    repository: Repository,
    blobs: Arc<dyn BlobStore>,
    config: CatalogConfig,
    max_scan_bytes: usize,
}

/// Downloaded passport scan
#[derive(Debug)]
pub struct PassportScan {
    pub key: String,
    pub content_type: &'static str,
    pub data: Vec<u8>,
}

impl EquipmentService {
    pub fn new(
        repository: Repository,
        blobs: Arc<dyn BlobStore>,
        config: CatalogConfig,
        max_scan_bytes: usize,
    ) -> Self {
        Self {
            repository,
            blobs,
            config,
            max_scan_bytes,
        }
    }

    fn policy(&self) -> SchemaPolicy {
        SchemaPolicy {
            enforce_type_schema: self.config.enforce_type_schema,
            validate_value_types: self.config.validate_value_types,
        }
    }

    /// Filter, search, order and paginate equipment
    pub async fn list(&self, query: &EquipmentQuery) -> AppResult<EquipmentPage> {
        let spec = ListSpec::from_query(query, &self.config)?;
        let (items, total) = self.repository.equipment_search(&spec).await?;
        Ok(EquipmentPage {
            items,
            total,
            page: spec.pagination.page,
            per_page: spec.pagination.per_page,
        })
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<EquipmentDetail> {
        self.repository.equipment_get(id).await
    }

    pub async fn create(&self, data: &EquipmentInput) -> AppResult<EquipmentDetail> {
        let equipment = self.repository.equipment_create(data, self.policy()).await?;
        tracing::info!(
            equipment_id = equipment.equipment.id,
            inventory_number = %equipment.equipment.inventory_number,
            values = equipment.characteristic_values.len(),
            "Equipment created"
        );
        Ok(equipment)
    }

    pub async fn update(&self, id: i32, data: &EquipmentInput) -> AppResult<EquipmentDetail> {
        let equipment = self.repository.equipment_update(id, data, self.policy()).await?;
        tracing::info!(
            equipment_id = id,
            replaced_values = data.characteristic_values.is_some(),
            "Equipment updated"
        );
        Ok(equipment)
    }

    /// Delete equipment with its descendants, then drop their scans
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let scans = self.repository.equipment_delete(id).await?;
        tracing::info!(equipment_id = id, "Equipment deleted");
        for key in scans {
            self.discard_blob(&key).await;
        }
        Ok(())
    }

    /// Store a new passport scan and swap the reference
    pub async fn set_passport_scan(
        &self,
        id: i32,
        file_name: Option<&str>,
        data: Vec<u8>,
    ) -> AppResult<EquipmentDetail> {
        if data.is_empty() {
            return Err(AppError::invalid("file", "Uploaded file is empty"));
        }
        if data.len() > self.max_scan_bytes {
            return Err(AppError::invalid(
                "file",
                format!("File exceeds the {} byte limit", self.max_scan_bytes),
            ));
        }
        // Fail before writing anything for unknown equipment
        self.repository.equipment_get(id).await?;

        let key = blobs::passport_key(id, file_name, &data);
        self.blobs.put(&key, data).await?;

        let previous = match self.repository.equipment_set_passport_scan(id, Some(&key)).await {
            Ok(previous) => previous,
            Err(e) => {
                self.discard_blob(&key).await;
                return Err(e);
            }
        };
        if let Some(old) = previous.filter(|old| *old != key) {
            self.discard_blob(&old).await;
        }
        tracing::info!(equipment_id = id, key = %key, "Passport scan replaced");

        self.repository.equipment_get(id).await
    }

    pub async fn passport_scan(&self, id: i32) -> AppResult<PassportScan> {
        let equipment = self.repository.equipment_get(id).await?;
        let key = equipment
            .equipment
            .passport_scan
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} has no passport scan", id)))?;
        let data = self.blobs.get(&key).await?;
        Ok(PassportScan {
            content_type: blobs::content_type(&key),
            key,
            data,
        })
    }

    pub async fn clear_passport_scan(&self, id: i32) -> AppResult<()> {
        if let Some(old) = self.repository.equipment_set_passport_scan(id, None).await? {
            self.discard_blob(&old).await;
            tracing::info!(equipment_id = id, "Passport scan removed");
        }
        Ok(())
    }

    /// Orphaned blobs are harmless; failures are logged, not surfaced
    async fn discard_blob(&self, key: &str) {
        if let Err(e) = self.blobs.delete(key).await {
            tracing::warn!(key = %key, error = %e, "Failed to delete blob");
        }
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;

    use super::*;
    use crate::{
        blobs::MockBlobStore,
        models::{
            equipment_type::EquipmentTypeInput,
            site::{SiteInput, WorkshopInput},
        },
        repository::{CatalogRepository, MemoryRepository},
    };

    async fn seeded() -> (Arc<MemoryRepository>, EquipmentInput) {
        let repo = Arc::new(MemoryRepository::new());
        let site = repo
            .sites_create(&SiteInput {
                name: "Site1".into(),
                address: String::new(),
            })
            .await
            .unwrap();
        let workshop = repo
            .workshops_create(&WorkshopInput {
                name: "Workshop1".into(),
                site: site.id,
            })
            .await
            .unwrap();
        let equipment_type = repo
            .equipment_types_create(&EquipmentTypeInput {
                name: "Valve".into(),
                description: String::new(),
            })
            .await
            .unwrap();
        let input = EquipmentInput {
            name: "Valve0".into(),
            inventory_number: "INV100".into(),
            equipment_type: equipment_type.id,
            workshop: workshop.id,
            parent: None,
            characteristic_values: None,
        };
        (repo, input)
    }

    fn service(repo: Arc<MemoryRepository>, blobs: MockBlobStore) -> EquipmentService {
        EquipmentService::new(repo, Arc::new(blobs), CatalogConfig::default(), 1024)
    }

    #[tokio::test]
    async fn list_reports_page_window() {
        let (repo, input) = seeded().await;
        let svc = service(repo, MockBlobStore::new());
        for i in 0..5 {
            svc.create(&EquipmentInput {
                name: format!("Valve{}", i),
                inventory_number: format!("INV{}", 100 + i),
                ..input.clone()
            })
            .await
            .unwrap();
        }

        let page = svc
            .list(&EquipmentQuery {
                ordering: Some("-name".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!((page.page, page.per_page), (1, 2));
        let names: Vec<&str> = page.items.iter().map(|e| e.equipment.name.as_str()).collect();
        assert_eq!(names, vec!["Valve4", "Valve3"]);
    }

    #[tokio::test]
    async fn replacing_scan_deletes_previous_blob() {
        let (repo, input) = seeded().await;
        let created = repo.equipment_create(&input, SchemaPolicy::default()).await.unwrap();
        let id = created.equipment.id;
        let first = blobs::passport_key(id, Some("a.pdf"), b"one");
        let second = blobs::passport_key(id, Some("b.pdf"), b"two");

        let mut store = MockBlobStore::new();
        store.expect_put().times(2).returning(|_, _| Ok(()));
        store
            .expect_delete()
            .with(eq(first.clone()))
            .times(1)
            .returning(|_| Ok(()));

        let svc = service(repo, store);
        svc.set_passport_scan(id, Some("a.pdf"), b"one".to_vec()).await.unwrap();
        let detail = svc
            .set_passport_scan(id, Some("b.pdf"), b"two".to_vec())
            .await
            .unwrap();
        assert_eq!(detail.equipment.passport_scan, Some(second));
    }

    #[tokio::test]
    async fn oversized_scan_is_rejected_before_storage() {
        let (repo, input) = seeded().await;
        let created = repo.equipment_create(&input, SchemaPolicy::default()).await.unwrap();
        let svc = service(repo, MockBlobStore::new());

        let err = svc
            .set_passport_scan(created.equipment.id, Some("big.pdf"), vec![0; 2048])
            .await
            .unwrap_err();
        assert!(err.field_errors().unwrap().contains_key("file"));
    }

    #[tokio::test]
    async fn scan_for_unknown_equipment_writes_nothing() {
        let (repo, _) = seeded().await;
        let svc = service(repo, MockBlobStore::new());
        assert!(matches!(
            svc.set_passport_scan(999, Some("a.pdf"), b"x".to_vec()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_removes_descendant_scans_and_tolerates_blob_errors() {
        let (repo, input) = seeded().await;
        let root = repo.equipment_create(&input, SchemaPolicy::default()).await.unwrap();
        let child = repo
            .equipment_create(
                &EquipmentInput {
                    name: "Actuator".into(),
                    inventory_number: "INV200".into(),
                    parent: Some(root.equipment.id),
                    ..input.clone()
                },
                SchemaPolicy::default(),
            )
            .await
            .unwrap();
        repo.equipment_set_passport_scan(child.equipment.id, Some("passports/child.pdf"))
            .await
            .unwrap();

        let mut store = MockBlobStore::new();
        store
            .expect_delete()
            .with(eq("passports/child.pdf".to_string()))
            .times(1)
            .returning(|_| Err(AppError::Internal("disk gone".into())));

        let svc = service(repo.clone(), store);
        svc.delete(root.equipment.id).await.unwrap();
        assert!(matches!(
            repo.equipment_get(child.equipment.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn download_reports_missing_scan() {
        let (repo, input) = seeded().await;
        let created = repo.equipment_create(&input, SchemaPolicy::default()).await.unwrap();
        let svc = service(repo, MockBlobStore::new());
        assert!(matches!(
            svc.passport_scan(created.equipment.id).await,
            Err(AppError::NotFound(_))
        ));
    }
}
