//! Lifecycle Orchestrator
//!
//! Sequences the calls that take one remote object from absent to ready and
//! back:
//!
//! - create: body -> POST -> id (or prepaid order wait) -> poll -> tags -> read
//! - read: GET -> flatten
//! - update: diff -> one request per changed update group -> tags -> read
//! - delete: DELETE or unsubscribe -> poll until gone
//!
//! Every poll inside one operation shares a single deadline derived from the
//! operation's timeout.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::time::Instant;

use crate::body::BodyPurpose;
use crate::differ::{self, Diff};
use crate::error::{LifecycleError, LifecycleResult};
use crate::flatten::{self, extract_string};
use crate::invoker::{Invoker, Method, NotFoundRule, OperationRequest, resolve_path};
use crate::order::{BillingClient, OrderLookup, OrderWaiter};
use crate::poller::{Observation, PollSpec, StatePoller, StateRefresh, deadline_from};
use crate::provider::ResourceKind;
use crate::resource::{Resource, ResourceDescriptor, ResourceId, State, Value};
use crate::schema::ResourceSchema;
use crate::tags;

/// Charging mode value that routes a resource through the order waiter
pub const PREPAID: &str = "prePaid";

/// A path template plus the method and success codes to call it with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub method: Method,
    pub path: String,
    pub success_codes: Vec<u16>,
}

impl Endpoint {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            success_codes: method.default_success_codes().to_vec(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn with_success_codes(mut self, codes: &[u16]) -> Self {
        self.success_codes = codes.to_vec();
        self
    }
}

/// Attributes updated together by one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateGroup {
    pub attributes: Vec<String>,
    pub endpoint: Endpoint,
    /// Narrow poll after the request; most updates complete synchronously
    pub poll: Option<PollSpec>,
}

impl UpdateGroup {
    pub fn new(attributes: &[&str], endpoint: Endpoint) -> Self {
        Self {
            attributes: attributes.iter().map(|a| a.to_string()).collect(),
            endpoint,
            poll: None,
        }
    }

    pub fn with_poll(mut self, spec: PollSpec) -> Self {
        self.poll = Some(spec);
        self
    }

    fn touches(&self, changed: &[String]) -> bool {
        self.attributes.iter().any(|a| changed.contains(a))
    }
}

/// What create does with a remote object whose provisioning failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompensationPolicy {
    /// Leave the object for the operator to inspect
    #[default]
    Orphan,
    /// Issue one delete, ignoring its result
    DeleteBestEffort,
}

/// Where the order ID can be looked up when the create response lacks it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLookupDefinition {
    pub endpoint: Endpoint,
    pub order_id_path: String,
}

/// Billing behavior of kinds that can be prepaid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingDefinition {
    /// Attribute holding the charging mode
    pub charging_mode_attribute: String,
    /// Order ID path in the create response
    pub order_id_path: String,
    pub order_lookup: Option<OrderLookupDefinition>,
}

impl BillingDefinition {
    pub fn new(order_id_path: impl Into<String>) -> Self {
        Self {
            charging_mode_attribute: "charging_mode".to_string(),
            order_id_path: order_id_path.into(),
            order_lookup: None,
        }
    }

    pub fn with_order_lookup(mut self, endpoint: Endpoint, order_id_path: impl Into<String>) -> Self {
        self.order_lookup = Some(OrderLookupDefinition {
            endpoint,
            order_id_path: order_id_path.into(),
        });
        self
    }
}

/// Tags sub-resource of a kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagDefinition {
    /// Attribute holding the tags map
    pub attribute: String,
    /// Batch action path (`{"action": "create" | "delete", "tags": [..]}`)
    pub action_path: String,
    /// Where tags appear in the read response
    pub read_path: Option<String>,
}

impl TagDefinition {
    pub fn new(action_path: impl Into<String>) -> Self {
        Self {
            attribute: "tags".to_string(),
            action_path: action_path.into(),
            read_path: None,
        }
    }

    pub fn with_read_path(mut self, path: impl Into<String>) -> Self {
        self.read_path = Some(path.into());
        self
    }
}

/// Picks one object out of a list response by its identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadSelector {
    /// Path of the list in the response (e.g., "log_groups")
    pub list_path: String,
    /// Field of each item holding its identifier
    pub id_field: String,
}

impl ReadSelector {
    pub fn new(list_path: impl Into<String>, id_field: impl Into<String>) -> Self {
        Self {
            list_path: list_path.into(),
            id_field: id_field.into(),
        }
    }

    /// The item whose `id_field` equals `identifier`, if any
    pub fn select(&self, document: &serde_json::Value, identifier: &str) -> LifecycleResult<Option<serde_json::Value>> {
        let list = flatten::PathExpr::parse(&self.list_path)?.evaluate(document);
        let Some(serde_json::Value::Array(items)) = list else {
            return Ok(None);
        };
        for item in items {
            if extract_string(&item, &self.id_field)?.as_deref() == Some(identifier) {
                return Ok(Some(item));
            }
        }
        Ok(None)
    }
}

/// Everything the orchestrator needs to know about a kind besides its body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindDefinition {
    /// Service name used to pick an endpoint (e.g., "vpc", "dms")
    pub service: String,
    pub create: Endpoint,
    /// Path of the new object's ID in the create response
    pub id_path: String,
    pub read: Endpoint,
    /// Picks the object out of the read response (for kinds only readable
    /// through a list endpoint)
    pub read_selector: Option<ReadSelector>,
    /// Path of the status in the read response
    pub status_path: Option<String>,
    /// Statuses that mean the object is gone
    pub gone_states: Vec<String>,
    pub create_poll: Option<PollSpec>,
    pub update_groups: Vec<UpdateGroup>,
    pub delete: Endpoint,
    pub delete_poll: Option<PollSpec>,
    pub not_found: NotFoundRule,
    /// Extra headers sent with every request of this kind
    pub headers: Vec<(String, String)>,
    pub billing: Option<BillingDefinition>,
    pub tags: Option<TagDefinition>,
    pub on_create_failure: CompensationPolicy,
}

impl KindDefinition {
    pub fn new(
        service: impl Into<String>,
        create: Endpoint,
        id_path: impl Into<String>,
        read: Endpoint,
        delete: Endpoint,
    ) -> Self {
        Self {
            service: service.into(),
            create,
            id_path: id_path.into(),
            read,
            read_selector: None,
            status_path: None,
            gone_states: Vec::new(),
            create_poll: None,
            update_groups: Vec::new(),
            delete,
            delete_poll: None,
            not_found: NotFoundRule::default(),
            headers: Vec::new(),
            billing: None,
            tags: None,
            on_create_failure: CompensationPolicy::default(),
        }
    }

    pub fn with_read_selector(mut self, selector: ReadSelector) -> Self {
        self.read_selector = Some(selector);
        self
    }

    pub fn with_status_path(mut self, path: impl Into<String>) -> Self {
        self.status_path = Some(path.into());
        self
    }

    pub fn with_gone_states(mut self, states: &[&str]) -> Self {
        self.gone_states = states.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_create_poll(mut self, spec: PollSpec) -> Self {
        self.create_poll = Some(spec);
        self
    }

    pub fn with_update_group(mut self, group: UpdateGroup) -> Self {
        self.update_groups.push(group);
        self
    }

    pub fn with_delete_poll(mut self, spec: PollSpec) -> Self {
        self.delete_poll = Some(spec);
        self
    }

    pub fn with_not_found(mut self, rule: NotFoundRule) -> Self {
        self.not_found = rule;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_billing(mut self, billing: BillingDefinition) -> Self {
        self.billing = Some(billing);
        self
    }

    pub fn with_tags(mut self, tags: TagDefinition) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn with_compensation(mut self, policy: CompensationPolicy) -> Self {
        self.on_create_failure = policy;
        self
    }
}

/// Per-operation timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: Duration::from_secs(30 * 60),
            update: Duration::from_secs(30 * 60),
            delete: Duration::from_secs(30 * 60),
        }
    }
}

/// Observes one object through its read endpoint
struct RestStateRefresh<'a> {
    lifecycle: &'a Lifecycle<'a>,
    identifier: &'a str,
}

#[async_trait]
impl StateRefresh for RestStateRefresh<'_> {
    async fn refresh(&mut self) -> LifecycleResult<Observation> {
        let Some(document) = self.lifecycle.fetch(self.identifier).await? else {
            return Ok(Observation::NotFound);
        };
        let status = match &self.lifecycle.definition.status_path {
            Some(path) => extract_string(&document, path)?,
            None => None,
        };
        Ok(Observation::Found { status, document })
    }
}

/// Phase-1 order lookup: the create response first, then the lookup endpoint
struct CreateOrderLookup<'a> {
    initial: Option<String>,
    invoker: &'a dyn Invoker,
    lookup: Option<(OperationRequest, &'a str)>,
}

#[async_trait]
impl OrderLookup for CreateOrderLookup<'_> {
    async fn lookup(&mut self) -> LifecycleResult<Option<String>> {
        if let Some(order_id) = self.initial.take() {
            return Ok(Some(order_id));
        }
        let Some((request, path)) = &self.lookup else {
            return Ok(None);
        };
        let response = self.invoker.invoke(request.clone()).await?;
        Ok(extract_string(&response.body, path)?)
    }
}

/// Drives the lifecycle of resources of one kind
pub struct Lifecycle<'a> {
    kind: &'a dyn ResourceKind,
    schema: ResourceSchema,
    definition: KindDefinition,
    invoker: &'a dyn Invoker,
    billing: Option<&'a dyn BillingClient>,
    params: HashMap<String, String>,
    timeouts: Timeouts,
}

impl<'a> Lifecycle<'a> {
    pub fn new(kind: &'a dyn ResourceKind, invoker: &'a dyn Invoker) -> Self {
        Self {
            kind,
            schema: kind.schema(),
            definition: kind.definition(),
            invoker,
            billing: None,
            params: HashMap::new(),
            timeouts: Timeouts::default(),
        }
    }

    pub fn with_billing(mut self, billing: &'a dyn BillingClient) -> Self {
        self.billing = Some(billing);
        self
    }

    /// Add a path parameter (e.g., `project_id`)
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn definition(&self) -> &KindDefinition {
        &self.definition
    }

    fn descriptor(&self, identifier: &str) -> ResourceDescriptor {
        ResourceDescriptor::new(self.kind.name(), self.definition.read.path.clone(), identifier)
    }

    fn request(&self, endpoint: &Endpoint, identifier: Option<&str>) -> LifecycleResult<OperationRequest> {
        let path = match identifier {
            Some(id) => {
                let mut params = self.params.clone();
                params.insert("id".to_string(), id.to_string());
                resolve_path(&endpoint.path, &params)?
            }
            None => resolve_path(&endpoint.path, &self.params)?,
        };
        Ok(OperationRequest::new(endpoint.method, path)
            .with_success_codes(&endpoint.success_codes)
            .with_headers(&self.definition.headers))
    }

    fn is_prepaid(&self, attributes: &HashMap<String, Value>) -> bool {
        self.definition.billing.as_ref().is_some_and(|billing| {
            attributes
                .get(&billing.charging_mode_attribute)
                .and_then(Value::as_str)
                == Some(PREPAID)
        })
    }

    fn validate(&self, resource: &Resource) -> LifecycleResult<()> {
        self.schema.validate(&resource.attributes).map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            LifecycleError::configuration(format!("{}: {}", resource.id, messages.join("; ")))
        })
    }

    /// Create the object and wait until it is ready
    pub async fn create(&self, resource: &Resource) -> LifecycleResult<State> {
        let deadline = deadline_from(Instant::now(), self.timeouts.create);

        let mut resource = resource.clone();
        self.schema.apply_defaults(&mut resource.attributes);
        self.validate(&resource)?;

        let mut request = self.request(&self.definition.create, None)?;
        if let Some(body) = self
            .kind
            .build_request_body(BodyPurpose::Create, &resource)?
        {
            request = request.with_body(body);
        }

        info!("Creating {}", resource.id);
        let response = self.invoker.invoke(request).await?;
        let created_id = extract_string(&response.body, &self.definition.id_path)?;

        let identifier = if self.is_prepaid(&resource.attributes) {
            self.wait_for_order(&resource, &response.body, created_id, deadline)
                .await?
        } else {
            created_id.ok_or_else(|| LifecycleError::MissingIdentifier {
                path: self.definition.id_path.clone(),
                context: "create".to_string(),
            })?
        };
        info!("{} created as {}", resource.id, identifier);

        if let Some(spec) = &self.definition.create_poll
            && let Err(e) = self.poll(spec, &identifier, deadline).await
        {
            self.compensate(&resource, &identifier).await;
            return Err(e);
        }

        if let Some(tag_def) = &self.definition.tags {
            self.apply_tags(&identifier, None, resource.attributes.get(&tag_def.attribute))
                .await?;
        }

        let state = self.read(&resource.id, &identifier).await?;
        if !state.exists {
            return Err(LifecycleError::ResourceGone {
                resource: self.descriptor(&identifier).to_string(),
            });
        }
        Ok(self.carry_write_only(state, &resource))
    }

    /// Keep attributes the read response never returns (e.g. `charging_mode`)
    fn carry_write_only(&self, mut state: State, resource: &Resource) -> State {
        for attr in self.schema.attributes.values() {
            if attr.read_path.is_some() || attr.computed {
                continue;
            }
            if let Some(value) = resource.attributes.get(&attr.name) {
                state
                    .attributes
                    .entry(attr.name.clone())
                    .or_insert_with(|| value.clone());
            }
        }
        state
    }

    async fn wait_for_order(
        &self,
        resource: &Resource,
        create_response: &serde_json::Value,
        created_id: Option<String>,
        deadline: Instant,
    ) -> LifecycleResult<String> {
        let billing = self.billing.ok_or_else(|| {
            LifecycleError::configuration(format!(
                "{}: prepaid resources need a billing client",
                resource.id
            ))
        })?;
        let Some(billing_def) = &self.definition.billing else {
            return Err(LifecycleError::configuration(format!(
                "{} cannot be prepaid",
                self.kind.name()
            )));
        };

        let lookup = match &billing_def.order_lookup {
            Some(def) => Some((
                self.request(&def.endpoint, created_id.as_deref())?,
                def.order_id_path.as_str(),
            )),
            None => None,
        };
        let mut lookup = CreateOrderLookup {
            initial: extract_string(create_response, &billing_def.order_id_path)?,
            invoker: self.invoker,
            lookup,
        };

        let label = resource.id.to_string();
        let record = OrderWaiter::new(billing, &label)
            .wait(&mut lookup, deadline)
            .await?;

        match created_id {
            Some(id) => Ok(id),
            None => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                billing.order_resource_id(&record.order_id, remaining).await
            }
        }
    }

    async fn compensate(&self, resource: &Resource, identifier: &str) {
        match self.definition.on_create_failure {
            CompensationPolicy::Orphan => {
                warn!(
                    "{} ({}) failed to become ready and was left in place",
                    resource.id, identifier
                );
            }
            CompensationPolicy::DeleteBestEffort => {
                warn!(
                    "{} ({}) failed to become ready, deleting it",
                    resource.id, identifier
                );
                let prepaid = self.is_prepaid(&resource.attributes);
                if let Err(e) = self.issue_delete(identifier, prepaid).await {
                    warn!("Best-effort delete of {} failed: {}", identifier, e);
                }
            }
        }
    }

    /// Fetch the object's document; `None` when it is missing or gone
    async fn fetch(&self, identifier: &str) -> LifecycleResult<Option<serde_json::Value>> {
        let request = self.request(&self.definition.read, Some(identifier))?;
        let response = match self.invoker.invoke(request).await {
            Ok(response) => response,
            Err(e) if self.definition.not_found.matches(&e) => return Ok(None),
            Err(e) => return Err(e),
        };

        let document = match &self.definition.read_selector {
            Some(selector) => match selector.select(&response.body, identifier)? {
                Some(document) => document,
                None => return Ok(None),
            },
            None => response.body,
        };

        if let Some(path) = &self.definition.status_path
            && let Some(status) = extract_string(&document, path)?
            && self.definition.gone_states.contains(&status)
        {
            debug!("{} is {}", self.descriptor(identifier), status);
            return Ok(None);
        }
        Ok(Some(document))
    }

    /// Read the object; a missing or gone object yields `State::not_found`
    pub async fn read(&self, id: &ResourceId, identifier: &str) -> LifecycleResult<State> {
        let Some(document) = self.fetch(identifier).await? else {
            debug!("{} ({}) not found", id, identifier);
            return Ok(State::not_found(id.clone()));
        };

        let mut attributes = flatten::flatten(&self.schema, &document)?;

        if let Some(tag_def) = &self.definition.tags
            && let Some(path) = &tag_def.read_path
        {
            let list = flatten::PathExpr::parse(path)?
                .evaluate(&document)
                .and_then(|v| v.as_array().cloned())
                .unwrap_or_default();
            attributes.insert(
                tag_def.attribute.clone(),
                Value::Map(tags::parse_tags(&list)),
            );
        }

        Ok(State::existing(id.clone(), attributes).with_identifier(identifier))
    }

    /// Update changed attributes in place
    ///
    /// Nothing is sent when a ForceNew attribute changed or when a changed
    /// attribute has no update operation.
    pub async fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> LifecycleResult<State> {
        let deadline = deadline_from(Instant::now(), self.timeouts.update);

        let changed = match differ::diff(&self.schema, to, from) {
            Diff::Create => {
                return Err(LifecycleError::ResourceGone {
                    resource: self.descriptor(identifier).to_string(),
                });
            }
            Diff::Replace { attributes } => {
                return Err(LifecycleError::RequiresReplacement { attributes });
            }
            Diff::NoChange => {
                let state = self.read(id, identifier).await?;
                return Ok(self.carry_write_only(state, to));
            }
            Diff::Update { changed_attributes } => changed_attributes,
        };
        self.validate(to)?;

        let tag_attribute = self.definition.tags.as_ref().map(|t| t.attribute.as_str());
        let uncovered: Vec<String> = changed
            .iter()
            .filter(|name| Some(name.as_str()) != tag_attribute)
            .filter(|name| !self.definition.update_groups.iter().any(|g| g.attributes.contains(name)))
            .cloned()
            .collect();
        if !uncovered.is_empty() {
            return Err(LifecycleError::NotUpdatable {
                attributes: uncovered,
            });
        }

        for group in self.definition.update_groups.iter().filter(|g| g.touches(&changed)) {
            let mut request = self.request(&group.endpoint, Some(identifier))?;
            if let Some(body) = self
                .kind
                .build_request_body(BodyPurpose::Update(group), to)?
            {
                request = request.with_body(body);
            }
            info!("Updating {} of {}", group.attributes.join(", "), id);
            self.invoker.invoke(request).await?;

            if let Some(spec) = &group.poll {
                self.poll(spec, identifier, deadline).await?;
            }
        }

        if let Some(attribute) = tag_attribute
            && changed.iter().any(|c| c == attribute)
        {
            self.apply_tags(identifier, from.attributes.get(attribute), to.attributes.get(attribute))
                .await?;
        }

        let state = self.read(id, identifier).await?;
        Ok(self.carry_write_only(state, to))
    }

    /// Delete (or unsubscribe) the object and wait until it is gone
    ///
    /// An object that is already gone counts as deleted.
    pub async fn delete(&self, id: &ResourceId, identifier: &str, from: &State) -> LifecycleResult<()> {
        let deadline = deadline_from(Instant::now(), self.timeouts.delete);
        let prepaid = self.is_prepaid(&from.attributes);

        // unsubscribe errors do not tell whether the object is gone
        if prepaid && self.fetch(identifier).await?.is_none() {
            debug!("{} ({}) already gone", id, identifier);
            return Ok(());
        }

        info!("Deleting {} ({})", id, identifier);
        match self.issue_delete(identifier, prepaid).await {
            Ok(()) => {}
            Err(e) if self.definition.not_found.matches(&e) => {
                debug!("{} ({}) already gone", id, identifier);
                return Ok(());
            }
            Err(e) if prepaid => {
                if self.fetch(identifier).await?.is_some() {
                    return Err(e);
                }
                debug!("{} ({}) gone after failed unsubscribe: {}", id, identifier, e);
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        if let Some(spec) = &self.definition.delete_poll {
            self.poll(spec, identifier, deadline).await?;
        }
        info!("{} ({}) deleted", id, identifier);
        Ok(())
    }

    async fn issue_delete(&self, identifier: &str, prepaid: bool) -> LifecycleResult<()> {
        if prepaid {
            let billing = self.billing.ok_or_else(|| {
                LifecycleError::configuration("prepaid resources need a billing client")
            })?;
            return billing.unsubscribe(&[identifier.to_string()]).await;
        }
        let request = self.request(&self.definition.delete, Some(identifier))?;
        self.invoker.invoke(request).await?;
        Ok(())
    }

    async fn poll(
        &self,
        spec: &PollSpec,
        identifier: &str,
        deadline: Instant,
    ) -> LifecycleResult<Option<serde_json::Value>> {
        let mut refresh = RestStateRefresh {
            lifecycle: self,
            identifier,
        };
        let label = self.descriptor(identifier).to_string();
        let report = StatePoller::new(spec, &label)
            .run(&mut refresh, Some(deadline))
            .await?;
        report.into_result(&label)
    }

    async fn apply_tags(
        &self,
        identifier: &str,
        old: Option<&Value>,
        new: Option<&Value>,
    ) -> LifecycleResult<()> {
        let Some(tag_def) = &self.definition.tags else {
            return Ok(());
        };
        let (removed, added) = tags::diff_tags(old, new);
        let endpoint = Endpoint::post(tag_def.action_path.clone()).with_success_codes(&[200, 204]);

        for (action, list) in [("delete", removed), ("create", added)] {
            if list.is_empty() {
                continue;
            }
            let request = self
                .request(&endpoint, Some(identifier))?
                .with_body(serde_json::json!({"action": action, "tags": list}));
            debug!("Tag action {} on {}", action, identifier);
            self.invoker.invoke(request).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{BuildRequestBody, schema_body};
    use crate::invoker::Response;
    use crate::schema::{AttributeSchema, AttributeType, types};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Invoker answering from a per-(method, path) script, repeating the last answer
    #[derive(Default)]
    struct ScriptedInvoker {
        script: Mutex<HashMap<(Method, String), VecDeque<Result<serde_json::Value, (u16, String)>>>>,
        requests: Mutex<Vec<OperationRequest>>,
    }

    impl ScriptedInvoker {
        fn on(self, method: Method, path: &str, answers: Vec<Result<serde_json::Value, (u16, String)>>) -> Self {
            self.script
                .lock()
                .unwrap()
                .insert((method, path.to_string()), answers.into());
            self
        }

        fn requests(&self) -> Vec<OperationRequest> {
            self.requests.lock().unwrap().clone()
        }

        fn count(&self, method: Method, path: &str) -> usize {
            self.requests()
                .iter()
                .filter(|r| r.method == method && r.path == path)
                .count()
        }
    }

    #[async_trait]
    impl Invoker for ScriptedInvoker {
        async fn invoke(&self, request: OperationRequest) -> LifecycleResult<Response> {
            self.requests.lock().unwrap().push(request.clone());
            let mut script = self.script.lock().unwrap();
            let queue = script
                .get_mut(&(request.method, request.path.clone()))
                .unwrap_or_else(|| panic!("unscripted {} {}", request.method, request.path));
            let answer = if queue.len() > 1 {
                queue.pop_front().unwrap()
            } else {
                queue.front().cloned().unwrap()
            };
            match answer {
                Ok(body) => Ok(Response { status: 200, body }),
                Err((code, body)) => Err(LifecycleError::UnexpectedStatus { code, body }),
            }
        }
    }

    #[derive(Default)]
    struct FakeBilling {
        unsubscribed: Mutex<Vec<String>>,
        unsubscribe_error: Option<(u16, String)>,
    }

    impl FakeBilling {
        fn failing_unsubscribe(code: u16, body: serde_json::Value) -> Self {
            Self {
                unsubscribe_error: Some((code, body.to_string())),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl BillingClient for FakeBilling {
        async fn wait_order_complete(&self, _order_id: &str, _timeout: Duration) -> LifecycleResult<()> {
            Ok(())
        }

        async fn order_resource_id(&self, order_id: &str, _timeout: Duration) -> LifecycleResult<String> {
            Ok(format!("res-of-{}", order_id))
        }

        async fn unsubscribe(&self, resource_ids: &[String]) -> LifecycleResult<()> {
            self.unsubscribed.lock().unwrap().extend_from_slice(resource_ids);
            match &self.unsubscribe_error {
                Some((code, body)) => Err(LifecycleError::UnexpectedStatus {
                    code: *code,
                    body: body.clone(),
                }),
                None => Ok(()),
            }
        }
    }

    /// A RocketMQ-like kind used across the tests
    struct Broker;

    impl BuildRequestBody for Broker {
        fn build_request_body(
            &self,
            purpose: BodyPurpose<'_>,
            resource: &Resource,
        ) -> LifecycleResult<Option<serde_json::Value>> {
            Ok(Some(schema_body(&self.schema(), purpose, resource)))
        }
    }

    impl ResourceKind for Broker {
        fn name(&self) -> &'static str {
            "broker"
        }

        fn schema(&self) -> ResourceSchema {
            ResourceSchema::new("broker")
                .attribute(
                    AttributeSchema::new("name", AttributeType::String)
                        .required()
                        .with_path("name"),
                )
                .attribute(
                    AttributeSchema::new("description", AttributeType::String)
                        .with_path("description"),
                )
                .attribute(
                    AttributeSchema::new("flavor", AttributeType::String)
                        .force_new()
                        .with_path("flavor"),
                )
                .attribute(
                    AttributeSchema::new("storage", AttributeType::Int).with_path("storage"),
                )
                .attribute(
                    AttributeSchema::new("charging_mode", types::charging_mode())
                        .force_new()
                        .with_default(Value::String("postPaid".to_string())),
                )
                .attribute(AttributeSchema::new("tags", types::tags()))
                .attribute(
                    AttributeSchema::new("status", AttributeType::String)
                        .computed()
                        .with_read_path("status"),
                )
        }

        fn definition(&self) -> KindDefinition {
            KindDefinition::new(
                "dms",
                Endpoint::post("v2/{project_id}/instances"),
                "instance_id",
                Endpoint::get("v2/{project_id}/instances/{id}"),
                Endpoint::delete("v2/{project_id}/instances/{id}").with_success_codes(&[204]),
            )
            .with_status_path("status")
            .with_gone_states(&["DELETED"])
            .with_create_poll(
                PollSpec::new(&["CREATING"], &["RUNNING"])
                    .with_failures(&["CREATEFAILED"])
                    .with_interval(Duration::from_secs(10))
                    .with_timeout(Duration::from_secs(50 * 60)),
            )
            .with_update_group(UpdateGroup::new(
                &["name", "description"],
                Endpoint::put("v2/{project_id}/instances/{id}").with_success_codes(&[204]),
            ))
            .with_update_group(
                UpdateGroup::new(
                    &["storage"],
                    Endpoint::post("v2/{project_id}/instances/{id}/extend"),
                )
                .with_poll(
                    PollSpec::new(&["EXTENDING"], &["RUNNING"]).with_interval(Duration::from_secs(5)),
                ),
            )
            .with_delete_poll(
                PollSpec::until_deleted(&["DELETING"]).with_interval(Duration::from_secs(10)),
            )
            .with_not_found(NotFoundRule::with_error_codes(&["DMS.00404022"]))
            .with_billing(BillingDefinition::new("order_id"))
            .with_tags(
                TagDefinition::new("v2/{project_id}/rocketmq/{id}/tags/action").with_read_path("tags"),
            )
        }
    }

    const INSTANCE: &str = "v2/p1/instances/i-1";

    fn not_found() -> Result<serde_json::Value, (u16, String)> {
        Err((
            404,
            json!({"error_code": "DMS.00404022", "error_msg": "instance not found"}).to_string(),
        ))
    }

    fn running() -> serde_json::Value {
        json!({"name": "mq", "status": "RUNNING", "storage": 300, "tags": [{"key": "env", "value": "prod"}]})
    }

    fn desired() -> Resource {
        Resource::new("broker", "mq")
            .with_attribute("name", Value::String("mq".to_string()))
            .with_attribute("flavor", Value::String("c6.4u8g".to_string()))
            .with_attribute("storage", Value::Int(300))
    }

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[tokio::test(start_paused = true)]
    async fn create_polls_until_running_then_reads() {
        init_logger();
        let invoker = ScriptedInvoker::default()
            .on(Method::Post, "v2/p1/instances", vec![Ok(json!({"instance_id": "i-1"}))])
            .on(
                Method::Get,
                INSTANCE,
                vec![
                    Ok(json!({"status": "CREATING"})),
                    Ok(json!({"status": "CREATING"})),
                    Ok(running()),
                ],
            );
        let kind = Broker;
        let lifecycle = Lifecycle::new(&kind, &invoker).with_param("project_id", "p1");

        let state = lifecycle.create(&desired()).await.unwrap();

        assert!(state.exists);
        assert_eq!(state.identifier.as_deref(), Some("i-1"));
        assert_eq!(state.get_string("status"), Some("RUNNING"));
        // three poll ticks plus the final read
        assert_eq!(invoker.count(Method::Get, INSTANCE), 4);

        let create = &invoker.requests()[0];
        assert_eq!(
            create.body,
            Some(json!({"name": "mq", "flavor": "c6.4u8g", "storage": 300}))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn create_adds_tags_after_the_object_is_ready() {
        let invoker = ScriptedInvoker::default()
            .on(Method::Post, "v2/p1/instances", vec![Ok(json!({"instance_id": "i-1"}))])
            .on(Method::Get, INSTANCE, vec![Ok(running())])
            .on(Method::Post, "v2/p1/rocketmq/i-1/tags/action", vec![Ok(serde_json::Value::Null)]);
        let kind = Broker;
        let lifecycle = Lifecycle::new(&kind, &invoker).with_param("project_id", "p1");

        let mut tags = HashMap::new();
        tags.insert("env".to_string(), Value::String("prod".to_string()));
        let resource = desired().with_attribute("tags", Value::Map(tags.clone()));

        let state = lifecycle.create(&resource).await.unwrap();

        let tag_requests: Vec<OperationRequest> = invoker
            .requests()
            .into_iter()
            .filter(|r| r.path.ends_with("tags/action"))
            .collect();
        assert_eq!(tag_requests.len(), 1);
        assert_eq!(
            tag_requests[0].body,
            Some(json!({"action": "create", "tags": [{"key": "env", "value": "prod"}]}))
        );
        assert_eq!(state.attributes.get("tags"), Some(&Value::Map(tags)));
    }

    #[tokio::test(start_paused = true)]
    async fn create_failure_status_surfaces_and_orphans_by_default() {
        let invoker = ScriptedInvoker::default()
            .on(Method::Post, "v2/p1/instances", vec![Ok(json!({"instance_id": "i-1"}))])
            .on(
                Method::Get,
                INSTANCE,
                vec![Ok(json!({"status": "CREATING"})), Ok(json!({"status": "CREATEFAILED"}))],
            );
        let kind = Broker;
        let lifecycle = Lifecycle::new(&kind, &invoker).with_param("project_id", "p1");

        let err = lifecycle.create(&desired()).await.unwrap_err();
        match err {
            LifecycleError::PollFailure { status, resource, .. } => {
                assert_eq!(status, "CREATEFAILED");
                assert_eq!(resource, "broker (i-1)");
            }
            other => panic!("Expected PollFailure, got {other:?}"),
        }
        assert_eq!(invoker.count(Method::Delete, INSTANCE), 0);
    }

    struct CleaningBroker;

    impl BuildRequestBody for CleaningBroker {
        fn build_request_body(
            &self,
            purpose: BodyPurpose<'_>,
            resource: &Resource,
        ) -> LifecycleResult<Option<serde_json::Value>> {
            Broker.build_request_body(purpose, resource)
        }
    }

    impl ResourceKind for CleaningBroker {
        fn name(&self) -> &'static str {
            "broker"
        }

        fn schema(&self) -> ResourceSchema {
            Broker.schema()
        }

        fn definition(&self) -> KindDefinition {
            Broker
                .definition()
                .with_compensation(CompensationPolicy::DeleteBestEffort)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn create_timeout_deletes_when_policy_says_so() {
        let invoker = ScriptedInvoker::default()
            .on(Method::Post, "v2/p1/instances", vec![Ok(json!({"instance_id": "i-1"}))])
            .on(Method::Get, INSTANCE, vec![Ok(json!({"status": "CREATING"}))])
            .on(Method::Delete, INSTANCE, vec![Err((500, "boom".to_string()))]);
        let kind = CleaningBroker;
        let lifecycle = Lifecycle::new(&kind, &invoker)
            .with_param("project_id", "p1")
            .with_timeouts(Timeouts {
                create: Duration::from_secs(60),
                ..Timeouts::default()
            });

        let start = Instant::now();
        let err = lifecycle.create(&desired()).await.unwrap_err();

        assert!(matches!(err, LifecycleError::PollTimeout { .. }));
        assert_eq!(start.elapsed(), Duration::from_secs(60));
        assert_eq!(invoker.count(Method::Delete, INSTANCE), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn prepaid_create_without_order_never_polls_state() {
        let invoker = ScriptedInvoker::default()
            .on(Method::Post, "v2/p1/instances", vec![Ok(json!({"instance_id": "i-1"}))]);
        let billing = FakeBilling::default();
        let kind = Broker;
        let lifecycle = Lifecycle::new(&kind, &invoker)
            .with_billing(&billing)
            .with_param("project_id", "p1")
            .with_timeouts(Timeouts {
                create: Duration::from_secs(50 * 60),
                ..Timeouts::default()
            });

        let resource = desired().with_attribute("charging_mode", Value::String("prePaid".to_string()));
        let err = lifecycle.create(&resource).await.unwrap_err();

        assert!(matches!(err, LifecycleError::OrderNeverAppeared { .. }));
        assert_eq!(invoker.count(Method::Get, INSTANCE), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn prepaid_create_resolves_id_from_the_order() {
        let invoker = ScriptedInvoker::default()
            .on(Method::Post, "v2/p1/instances", vec![Ok(json!({"order_id": "CS1"}))])
            .on(Method::Get, "v2/p1/instances/res-of-CS1", vec![Ok(running())]);
        let billing = FakeBilling::default();
        let kind = Broker;
        let lifecycle = Lifecycle::new(&kind, &invoker)
            .with_billing(&billing)
            .with_param("project_id", "p1");

        let resource = desired().with_attribute("charging_mode", Value::String("prePaid".to_string()));
        let state = lifecycle.create(&resource).await.unwrap();
        assert_eq!(state.identifier.as_deref(), Some("res-of-CS1"));
        // never returned by the read endpoint
        assert_eq!(state.get_string("charging_mode"), Some("prePaid"));
    }

    #[tokio::test(start_paused = true)]
    async fn prepaid_create_without_billing_client_is_a_configuration_error() {
        let invoker = ScriptedInvoker::default()
            .on(Method::Post, "v2/p1/instances", vec![Ok(json!({"order_id": "CS1"}))]);
        let kind = Broker;
        let lifecycle = Lifecycle::new(&kind, &invoker).with_param("project_id", "p1");

        let resource = desired().with_attribute("charging_mode", Value::String("prePaid".to_string()));
        let err = lifecycle.create(&resource).await.unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidConfiguration(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn create_rejects_invalid_configuration_before_any_request() {
        let invoker = ScriptedInvoker::default();
        let kind = Broker;
        let lifecycle = Lifecycle::new(&kind, &invoker).with_param("project_id", "p1");

        let err = lifecycle
            .create(&Resource::new("broker", "mq"))
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidConfiguration(_)));
        assert!(invoker.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn read_maps_not_found_and_gone_status() {
        let kind = Broker;
        let id = ResourceId::new("broker", "mq");

        let invoker = ScriptedInvoker::default().on(Method::Get, INSTANCE, vec![not_found()]);
        let lifecycle = Lifecycle::new(&kind, &invoker).with_param("project_id", "p1");
        assert!(!lifecycle.read(&id, "i-1").await.unwrap().exists);

        let invoker =
            ScriptedInvoker::default().on(Method::Get, INSTANCE, vec![Ok(json!({"status": "DELETED"}))]);
        let lifecycle = Lifecycle::new(&kind, &invoker).with_param("project_id", "p1");
        assert!(!lifecycle.read(&id, "i-1").await.unwrap().exists);

        let invoker = ScriptedInvoker::default().on(Method::Get, INSTANCE, vec![Err((500, "{}".to_string()))]);
        let lifecycle = Lifecycle::new(&kind, &invoker).with_param("project_id", "p1");
        assert!(matches!(
            lifecycle.read(&id, "i-1").await.unwrap_err(),
            LifecycleError::UnexpectedStatus { code: 500, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn update_of_force_new_attribute_sends_nothing() {
        let invoker = ScriptedInvoker::default();
        let kind = Broker;
        let lifecycle = Lifecycle::new(&kind, &invoker).with_param("project_id", "p1");

        let mut attrs = HashMap::new();
        attrs.insert("name".to_string(), Value::String("mq".to_string()));
        attrs.insert("flavor".to_string(), Value::String("c6.2u4g".to_string()));
        attrs.insert("storage".to_string(), Value::Int(300));
        let from = State::existing(ResourceId::new("broker", "mq"), attrs).with_identifier("i-1");

        let err = lifecycle
            .update(&from.id, "i-1", &from, &desired())
            .await
            .unwrap_err();

        match err {
            LifecycleError::RequiresReplacement { attributes } => {
                assert_eq!(attributes, vec!["flavor".to_string()]);
            }
            other => panic!("Expected RequiresReplacement, got {other:?}"),
        }
        assert!(invoker.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn update_sends_only_changed_groups() {
        let invoker = ScriptedInvoker::default()
            .on(Method::Post, "v2/p1/instances/i-1/extend", vec![Ok(json!({"job_id": "j"}))])
            .on(
                Method::Get,
                INSTANCE,
                vec![Ok(json!({"status": "EXTENDING"})), Ok(running())],
            );
        let kind = Broker;
        let lifecycle = Lifecycle::new(&kind, &invoker).with_param("project_id", "p1");

        let mut attrs = HashMap::new();
        attrs.insert("name".to_string(), Value::String("mq".to_string()));
        attrs.insert("flavor".to_string(), Value::String("c6.4u8g".to_string()));
        attrs.insert("storage".to_string(), Value::Int(200));
        let from = State::existing(ResourceId::new("broker", "mq"), attrs).with_identifier("i-1");

        let state = lifecycle
            .update(&from.id, "i-1", &from, &desired())
            .await
            .unwrap();

        assert_eq!(state.attributes.get("storage"), Some(&Value::Int(300)));
        assert_eq!(invoker.count(Method::Put, INSTANCE), 0);
        let extend = invoker
            .requests()
            .into_iter()
            .find(|r| r.path.ends_with("/extend"))
            .unwrap();
        assert_eq!(extend.body, Some(json!({"storage": 300})));
    }

    #[tokio::test(start_paused = true)]
    async fn update_without_matching_group_is_rejected() {
        struct NoUpdates;

        impl BuildRequestBody for NoUpdates {
            fn build_request_body(
                &self,
                _purpose: BodyPurpose<'_>,
                _resource: &Resource,
            ) -> LifecycleResult<Option<serde_json::Value>> {
                Ok(None)
            }
        }

        impl ResourceKind for NoUpdates {
            fn name(&self) -> &'static str {
                "broker"
            }

            fn schema(&self) -> ResourceSchema {
                Broker.schema()
            }

            fn definition(&self) -> KindDefinition {
                let mut definition = Broker.definition();
                definition.update_groups.clear();
                definition
            }
        }

        let invoker = ScriptedInvoker::default();
        let kind = NoUpdates;
        let lifecycle = Lifecycle::new(&kind, &invoker).with_param("project_id", "p1");

        let mut attrs = HashMap::new();
        attrs.insert("name".to_string(), Value::String("old".to_string()));
        let from = State::existing(ResourceId::new("broker", "mq"), attrs);
        let to = Resource::new("broker", "mq").with_attribute("name", Value::String("new".to_string()));

        let err = lifecycle.update(&from.id, "i-1", &from, &to).await.unwrap_err();
        assert!(matches!(err, LifecycleError::NotUpdatable { .. }));
        assert!(invoker.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn delete_of_absent_object_is_idempotent() {
        let invoker = ScriptedInvoker::default().on(Method::Delete, INSTANCE, vec![not_found()]);
        let kind = Broker;
        let lifecycle = Lifecycle::new(&kind, &invoker).with_param("project_id", "p1");
        let from = State::not_found(ResourceId::new("broker", "mq"));

        lifecycle.delete(&from.id, "i-1", &from).await.unwrap();
        assert_eq!(invoker.count(Method::Get, INSTANCE), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_polls_until_not_found() {
        let invoker = ScriptedInvoker::default()
            .on(Method::Delete, INSTANCE, vec![Ok(serde_json::Value::Null)])
            .on(
                Method::Get,
                INSTANCE,
                vec![Ok(json!({"status": "DELETING"})), not_found()],
            );
        let kind = Broker;
        let lifecycle = Lifecycle::new(&kind, &invoker).with_param("project_id", "p1");
        let from = State::existing(ResourceId::new("broker", "mq"), HashMap::new());

        let start = Instant::now();
        lifecycle.delete(&from.id, "i-1", &from).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        assert_eq!(invoker.count(Method::Get, INSTANCE), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn prepaid_delete_unsubscribes() {
        let invoker =
            ScriptedInvoker::default().on(Method::Get, INSTANCE, vec![Ok(running()), not_found()]);
        let billing = FakeBilling::default();
        let kind = Broker;
        let lifecycle = Lifecycle::new(&kind, &invoker)
            .with_billing(&billing)
            .with_param("project_id", "p1");

        let mut attrs = HashMap::new();
        attrs.insert("charging_mode".to_string(), Value::String("prePaid".to_string()));
        let from = State::existing(ResourceId::new("broker", "mq"), attrs);

        lifecycle.delete(&from.id, "i-1", &from).await.unwrap();
        assert_eq!(*billing.unsubscribed.lock().unwrap(), vec!["i-1".to_string()]);
        assert_eq!(invoker.count(Method::Delete, INSTANCE), 0);
    }

    fn prepaid_state() -> State {
        let mut attrs = HashMap::new();
        attrs.insert("charging_mode".to_string(), Value::String("prePaid".to_string()));
        State::existing(ResourceId::new("broker", "mq"), attrs)
    }

    fn resource_not_exist() -> serde_json::Value {
        json!({"error_code": "CBC.30000067", "error_msg": "resource not exist"})
    }

    #[tokio::test(start_paused = true)]
    async fn prepaid_delete_of_absent_object_skips_unsubscribe() {
        let invoker = ScriptedInvoker::default().on(Method::Get, INSTANCE, vec![not_found()]);
        let billing = FakeBilling::failing_unsubscribe(400, resource_not_exist());
        let kind = Broker;
        let lifecycle = Lifecycle::new(&kind, &invoker)
            .with_billing(&billing)
            .with_param("project_id", "p1");
        let from = prepaid_state();

        lifecycle.delete(&from.id, "i-1", &from).await.unwrap();
        assert!(billing.unsubscribed.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_unsubscribe_of_vanished_object_counts_as_deleted() {
        let invoker =
            ScriptedInvoker::default().on(Method::Get, INSTANCE, vec![Ok(running()), not_found()]);
        let billing = FakeBilling::failing_unsubscribe(400, resource_not_exist());
        let kind = Broker;
        let lifecycle = Lifecycle::new(&kind, &invoker)
            .with_billing(&billing)
            .with_param("project_id", "p1");
        let from = prepaid_state();

        lifecycle.delete(&from.id, "i-1", &from).await.unwrap();
        assert_eq!(*billing.unsubscribed.lock().unwrap(), vec!["i-1".to_string()]);
        assert_eq!(invoker.count(Method::Get, INSTANCE), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_unsubscribe_of_live_object_is_an_error() {
        let invoker = ScriptedInvoker::default().on(Method::Get, INSTANCE, vec![Ok(running())]);
        let billing = FakeBilling::failing_unsubscribe(400, json!({"error_code": "CBC.0151"}));
        let kind = Broker;
        let lifecycle = Lifecycle::new(&kind, &invoker)
            .with_billing(&billing)
            .with_param("project_id", "p1");
        let from = prepaid_state();

        let err = lifecycle.delete(&from.id, "i-1", &from).await.unwrap_err();
        assert!(matches!(err, LifecycleError::UnexpectedStatus { code: 400, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn prepaid_create_timeout_unsubscribes_when_policy_says_so() {
        let invoker = ScriptedInvoker::default()
            .on(
                Method::Post,
                "v2/p1/instances",
                vec![Ok(json!({"instance_id": "i-1", "order_id": "CS1"}))],
            )
            .on(Method::Get, INSTANCE, vec![Ok(json!({"status": "CREATING"}))]);
        let billing = FakeBilling::default();
        let kind = CleaningBroker;
        let lifecycle = Lifecycle::new(&kind, &invoker)
            .with_billing(&billing)
            .with_param("project_id", "p1")
            .with_timeouts(Timeouts {
                create: Duration::from_secs(60),
                ..Timeouts::default()
            });

        let resource = desired().with_attribute("charging_mode", Value::String("prePaid".to_string()));
        let err = lifecycle.create(&resource).await.unwrap_err();

        assert!(matches!(err, LifecycleError::PollTimeout { .. }));
        assert_eq!(*billing.unsubscribed.lock().unwrap(), vec!["i-1".to_string()]);
        assert_eq!(invoker.count(Method::Delete, INSTANCE), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn huge_operation_timeout_does_not_overflow() {
        let invoker = ScriptedInvoker::default()
            .on(Method::Post, "v2/p1/instances", vec![Ok(json!({"instance_id": "i-1"}))])
            .on(Method::Get, INSTANCE, vec![Ok(running())]);
        let kind = Broker;
        let lifecycle = Lifecycle::new(&kind, &invoker)
            .with_param("project_id", "p1")
            .with_timeouts(Timeouts {
                create: Duration::from_secs(u64::MAX),
                update: Duration::MAX,
                delete: Duration::MAX,
            });

        let state = lifecycle.create(&desired()).await.unwrap();
        assert_eq!(state.identifier.as_deref(), Some("i-1"));
    }

    /// Broker readable only through the instance listing
    struct ListedBroker;

    impl BuildRequestBody for ListedBroker {
        fn build_request_body(
            &self,
            purpose: BodyPurpose<'_>,
            resource: &Resource,
        ) -> LifecycleResult<Option<serde_json::Value>> {
            Broker.build_request_body(purpose, resource)
        }
    }

    impl ResourceKind for ListedBroker {
        fn name(&self) -> &'static str {
            "broker"
        }

        fn schema(&self) -> ResourceSchema {
            Broker.schema()
        }

        fn definition(&self) -> KindDefinition {
            let mut definition = Broker
                .definition()
                .with_read_selector(ReadSelector::new("instances", "instance_id"));
            definition.read = Endpoint::get("v2/{project_id}/instances");
            definition
        }
    }

    #[tokio::test(start_paused = true)]
    async fn read_selects_object_from_listing_by_identifier() {
        let listing = json!({"instances": [
            {"instance_id": "i-1", "name": "other", "status": "RUNNING"},
            {"instance_id": "it's-2", "name": "mq", "status": "RUNNING"},
        ]});
        let invoker = ScriptedInvoker::default().on(Method::Get, "v2/p1/instances", vec![Ok(listing)]);
        let kind = ListedBroker;
        let lifecycle = Lifecycle::new(&kind, &invoker).with_param("project_id", "p1");
        let id = ResourceId::new("broker", "mq");

        let state = lifecycle.read(&id, "it's-2").await.unwrap();
        assert!(state.exists);
        assert_eq!(state.get_string("name"), Some("mq"));

        assert!(!lifecycle.read(&id, "i-9").await.unwrap().exists);
    }

    #[test]
    fn request_reports_missing_project() {
        let invoker = ScriptedInvoker::default();
        let kind = Broker;
        let lifecycle = Lifecycle::new(&kind, &invoker);
        let err = lifecycle
            .request(&lifecycle.definition().read, Some("i-1"))
            .unwrap_err();
        assert!(matches!(err, LifecycleError::UnresolvedPlaceholder { .. }));
    }
}
