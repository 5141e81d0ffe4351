use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set};

use crate::entities::keypair;
use crate::models::Keypair;

/// Fields supplied when a keypair is created. New pairs start out active.
#[derive(Debug, Clone)]
pub struct NewKeypair {
    pub name: String,
    pub pin: String,
    pub rfid_uid: String,
}

/// Column-level changes; `None` leaves a column untouched.
#[derive(Debug, Clone, Default)]
pub struct KeypairChanges {
    pub name: Option<String>,
    pub pin: Option<String>,
    pub rfid_uid: Option<String>,
    pub is_active: Option<bool>,
}

impl KeypairChanges {
    pub fn name(value: String) -> Self {
        Self { name: Some(value), ..Default::default() }
    }

    pub fn pin(value: String) -> Self {
        Self { pin: Some(value), ..Default::default() }
    }

    pub fn rfid_uid(value: String) -> Self {
        Self { rfid_uid: Some(value), ..Default::default() }
    }

    pub fn is_active(value: bool) -> Self {
        Self { is_active: Some(value), ..Default::default() }
    }

    fn is_empty(&self) -> bool {
        self.name.is_none() && self.pin.is_none() && self.rfid_uid.is_none() && self.is_active.is_none()
    }
}

/// Keypair persistence. Updates and deletes report how many rows they touched
/// and never fail on a missing id.
#[derive(Clone)]
pub struct KeypairRepo {
    db: DatabaseConnection,
}

impl KeypairRepo {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find_all(&self) -> Result<Vec<Keypair>, DbErr> {
        keypair::Entity::find().all(&self.db).await
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<Keypair>, DbErr> {
        keypair::Entity::find_by_id(id).one(&self.db).await
    }

    pub async fn create(&self, new: NewKeypair) -> Result<Keypair, DbErr> {
        keypair::ActiveModel {
            name: Set(new.name),
            pin: Set(new.pin),
            rfid_uid: Set(new.rfid_uid),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(&self.db)
        .await
    }

    pub async fn update_fields(&self, id: i32, changes: KeypairChanges) -> Result<u64, DbErr> {
        if changes.is_empty() {
            return Ok(0);
        }

        let mut update = keypair::Entity::update_many().filter(keypair::Column::Id.eq(id));
        if let Some(name) = changes.name {
            update = update.col_expr(keypair::Column::Name, Expr::value(name));
        }
        if let Some(pin) = changes.pin {
            update = update.col_expr(keypair::Column::Pin, Expr::value(pin));
        }
        if let Some(rfid_uid) = changes.rfid_uid {
            update = update.col_expr(keypair::Column::RfidUid, Expr::value(rfid_uid));
        }
        if let Some(is_active) = changes.is_active {
            update = update.col_expr(keypair::Column::IsActive, Expr::value(is_active));
        }

        Ok(update.exec(&self.db).await?.rows_affected)
    }

    pub async fn delete(&self, id: i32) -> Result<u64, DbErr> {
        Ok(keypair::Entity::delete_by_id(id).exec(&self.db).await?.rows_affected)
    }
}
