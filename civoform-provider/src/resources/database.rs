//! `civo.database` - managed MySQL/PostgreSQL databases

use async_trait::async_trait;
use civoform_core::provider::ProviderResult;
use civoform_core::resource::{ResourceId, State, Value};
use civoform_core::schema::{AttributeSchema, AttributeType, ResourceSchema, Validator, types};
use log::info;

use super::{
    Context, ResourceHandler, api_error, existing, found, id_attribute, region_attribute,
    wait_error, wait_until_gone, with_status,
};
use crate::client::{CivoClient, Database, DatabaseConfig, DatabaseUpdate};
use crate::utils::{
    Attributes, ObjectRef, changed, get_int, get_str, require_int, require_str, set, set_str,
};

pub struct DatabaseHandler;

fn nodes_type() -> AttributeType {
    AttributeType::Custom {
        name: "DatabaseNodes".to_string(),
        base: Box::new(AttributeType::Int),
        validate: Validator::new(|value| match value {
            Value::Int(1 | 3) => Ok(()),
            Value::Int(n) => Err(format!("Value must be 1 or 3, got {}", n)),
            _ => Ok(()),
        }),
    }
}

pub(crate) fn database_attributes(db: &Database) -> Attributes {
    let mut attrs = Attributes::new();
    set_str(&mut attrs, "name", &db.name);
    set_str(&mut attrs, "size", &db.size);
    set(&mut attrs, "nodes", db.nodes);
    set_str(&mut attrs, "engine", &db.software);
    set_str(&mut attrs, "version", &db.software_version);
    set_str(&mut attrs, "network_id", &db.network_id);
    set_str(&mut attrs, "firewall_id", &db.firewall_id);
    let endpoint = if db.public_ipv4.is_empty() {
        &db.private_ipv4
    } else {
        &db.public_ipv4
    };
    set_str(&mut attrs, "endpoint", endpoint);
    set(&mut attrs, "port", db.port);
    set_str(&mut attrs, "username", &db.username);
    set_str(&mut attrs, "password", &db.password);
    set_str(&mut attrs, "status", &db.status);
    attrs
}

impl DatabaseHandler {
    async fn wait_ready(
        &self,
        ctx: &Context,
        client: &CivoClient,
        id: &ResourceId,
        db_id: &str,
    ) -> ProviderResult<Database> {
        ctx.waits
            .conf(&["Pending", "Building", "Updating", "Scaling"], &["Ready"])
            .wait_for_state(move || async move {
                with_status(client.get_database(db_id).await, |db| db.status.clone())
            })
            .await
            .map_err(wait_error(id, "database to become Ready"))
    }
}

#[async_trait]
impl ResourceHandler for DatabaseHandler {
    fn resource_type(&self) -> &'static str {
        "database"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new("database")
            .with_description("A managed database cluster")
            .attribute(id_attribute())
            .attribute(region_attribute())
            .attribute(AttributeSchema::new("name", types::non_empty_string()).required())
            .attribute(
                AttributeSchema::new("size", types::non_empty_string())
                    .required()
                    .force_new(),
            )
            .attribute(AttributeSchema::new("nodes", nodes_type()).with_default(Value::Int(1)))
            .attribute(
                AttributeSchema::new("engine", types::non_empty_string())
                    .required()
                    .force_new()
                    .with_description("Database software, for example MySQL or PostgreSQL"),
            )
            .attribute(
                AttributeSchema::new("version", AttributeType::String)
                    .optional_computed()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("network_id", AttributeType::String)
                    .optional_computed()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("firewall_id", AttributeType::String).optional_computed(),
            )
            .attribute(AttributeSchema::new("endpoint", AttributeType::String).computed())
            .attribute(AttributeSchema::new("port", AttributeType::Int).computed())
            .attribute(AttributeSchema::new("username", AttributeType::String).computed())
            .attribute(
                AttributeSchema::new("password", AttributeType::String)
                    .computed()
                    .sensitive(),
            )
            .attribute(AttributeSchema::new("status", AttributeType::String).computed())
    }

    async fn create(&self, ctx: &Context, id: &ResourceId, attrs: &Attributes) -> ProviderResult<State> {
        let client = ctx.client_for(get_str(attrs, "region").as_deref());
        let config = DatabaseConfig {
            name: require_str(id, attrs, "name")?,
            size: require_str(id, attrs, "size")?,
            nodes: get_int(attrs, "nodes").unwrap_or(1),
            software: require_str(id, attrs, "engine")?,
            software_version: get_str(attrs, "version").unwrap_or_default(),
            network_id: get_str(attrs, "network_id").unwrap_or_default(),
            firewall_id: get_str(attrs, "firewall_id").unwrap_or_default(),
            region: Some(client.region().to_string()),
        };
        info!(
            "Creating {} database {} ({} x {})",
            config.software, config.name, config.nodes, config.size
        );
        let created = client
            .create_database(&config)
            .await
            .map_err(api_error(id, "create database"))?;
        let db = self.wait_ready(ctx, &client, id, &created.id).await?;
        Ok(existing(ctx, &client, id, &db.id, database_attributes(&db)))
    }

    async fn read(&self, ctx: &Context, id: &ResourceId, object: &ObjectRef) -> ProviderResult<State> {
        let client = ctx.client_for_object(object);
        Ok(
            match found(id, "read database", client.get_database(&object.id).await)? {
                Some(db) => existing(ctx, &client, id, &db.id, database_attributes(&db)),
                None => State::not_found(id.clone()),
            },
        )
    }

    async fn update(
        &self,
        ctx: &Context,
        id: &ResourceId,
        object: &ObjectRef,
        from: &State,
        attrs: &Attributes,
    ) -> ProviderResult<State> {
        let current = &from.attributes;
        let mut update = DatabaseUpdate::default();
        if changed(current, attrs, "name") {
            update.name = Some(require_str(id, attrs, "name")?);
        }
        if changed(current, attrs, "nodes") {
            update.nodes = Some(require_int(id, attrs, "nodes")?);
        }
        if changed(current, attrs, "firewall_id") {
            update.firewall_id = get_str(attrs, "firewall_id");
        }
        if update.name.is_none() && update.nodes.is_none() && update.firewall_id.is_none() {
            return Ok(from.clone());
        }

        let client = ctx.client_for_object(object);
        info!("Updating database {}", object.id);
        client
            .update_database(&object.id, &update)
            .await
            .map_err(api_error(id, "update database"))?;
        let db = self.wait_ready(ctx, &client, id, &object.id).await?;
        Ok(existing(ctx, &client, id, &db.id, database_attributes(&db)))
    }

    async fn delete(&self, ctx: &Context, id: &ResourceId, object: &ObjectRef) -> ProviderResult<()> {
        let client = ctx.client_for_object(object);
        info!("Deleting database {}", object.id);
        if found(id, "delete database", client.delete_database(&object.id).await)?.is_none() {
            return Ok(());
        }
        wait_until_gone(ctx, id, "database", || client.get_database(&object.id)).await
    }
}
