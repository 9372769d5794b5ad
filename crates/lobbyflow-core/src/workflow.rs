use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{LobbyflowError, Result};

/// Lifecycle status of a workflow definition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    #[default]
    Draft,
    Active,
    Inactive,
    Archived,
}

/// The event that starts a workflow run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    VisitorCheckin,
    VisitorCheckout,
    FormSubmission,
    #[default]
    Manual,
    Schedule,
    Api,
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::VisitorCheckin => "visitor_checkin",
            Self::VisitorCheckout => "visitor_checkout",
            Self::FormSubmission => "form_submission",
            Self::Manual => "manual",
            Self::Schedule => "schedule",
            Self::Api => "api",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for TriggerType {
    type Err = LobbyflowError;

    fn from_str(s: &str) -> Result<Self> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
            .map_err(|_| LobbyflowError::Config(format!("Unknown trigger type: {}", s)))
    }
}

/// A workflow definition as produced by the designer.
///
/// Read-only to the executor. Nodes are kept in designer order; lookups go
/// through [`Workflow::node`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: WorkflowStatus,
    #[serde(default)]
    pub trigger_type: TriggerType,
    #[serde(default)]
    pub nodes: Vec<WorkflowNode>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub start_node_id: String,
}

impl Workflow {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            status: WorkflowStatus::Draft,
            trigger_type: TriggerType::Manual,
            nodes: vec![],
            connections: vec![],
            start_node_id: String::new(),
        }
    }

    pub fn with_status(mut self, status: WorkflowStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_trigger(mut self, trigger: TriggerType) -> Self {
        self.trigger_type = trigger;
        self
    }

    /// Add a node. The first node added becomes the start node unless one is set.
    pub fn with_node(mut self, node: WorkflowNode) -> Self {
        if self.start_node_id.is_empty() {
            self.start_node_id = node.id.clone();
        }
        self.nodes.push(node);
        self
    }

    pub fn with_connection(mut self, connection: Connection) -> Self {
        self.connections.push(connection);
        self
    }

    pub fn with_start(mut self, node_id: impl Into<String>) -> Self {
        self.start_node_id = node_id.into();
        self
    }

    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Connections leaving `node_id`, in list order.
    pub fn outgoing<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections.iter().filter(move |c| c.from_node == node_id)
    }

    /// Whether this workflow should run for the given trigger event.
    pub fn accepts(&self, trigger: TriggerType) -> bool {
        self.status == WorkflowStatus::Active && self.trigger_type == trigger
    }

    /// Check the structural invariants of the graph.
    ///
    /// Exactly one start node that exists, and every `nextNodes` entry and
    /// connection endpoint resolves to a node in the set.
    pub fn validate(&self) -> Result<()> {
        if self.start_node_id.is_empty() {
            return Err(LobbyflowError::MissingStartNode(self.id.clone()));
        }

        let ids: HashMap<&str, &WorkflowNode> =
            self.nodes.iter().map(|n| (n.id.as_str(), n)).collect();

        if !ids.contains_key(self.start_node_id.as_str()) {
            return Err(LobbyflowError::StartNodeNotFound(self.start_node_id.clone()));
        }

        for node in &self.nodes {
            for next in &node.next_nodes {
                if !ids.contains_key(next.as_str()) {
                    return Err(LobbyflowError::DanglingReference {
                        from: node.id.clone(),
                        to: next.clone(),
                    });
                }
            }
        }

        for conn in &self.connections {
            for end in [&conn.from_node, &conn.to_node] {
                if !ids.contains_key(end.as_str()) {
                    return Err(LobbyflowError::DanglingReference {
                        from: conn.from_node.clone(),
                        to: end.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// A step in the workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowNode {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Node type and its type-specific config, on the wire as `type` + `config`.
    #[serde(flatten)]
    pub kind: NodeKind,
    /// Successor node ids. Used directly for every type except `condition`.
    #[serde(default)]
    pub next_nodes: Vec<String>,
}

impl WorkflowNode {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            next_nodes: vec![],
        }
    }

    pub fn then(mut self, next: impl Into<String>) -> Self {
        self.next_nodes.push(next.into());
        self
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }
}

/// Node kinds with their configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "snake_case")]
pub enum NodeKind {
    Form(FormConfig),
    Approval(ApprovalConfig),
    Condition(ConditionConfig),
    Notification(NotificationConfig),
    Delay(DelayConfig),
    Assignment(AssignmentConfig),
}

impl NodeKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Form(_) => "form",
            Self::Approval(_) => "approval",
            Self::Condition(_) => "condition",
            Self::Notification(_) => "notification",
            Self::Delay(_) => "delay",
            Self::Assignment(_) => "assignment",
        }
    }
}

/// A single field of a visitor form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormField {
    /// Key into `formData`.
    #[serde(alias = "id")]
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, rename = "type")]
    pub field_type: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Option<Vec<String>>,
}

impl FormField {
    pub fn required(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            field_type: Some("text".into()),
            required: true,
            options: None,
        }
    }

    /// Label for messages, falling back to the key.
    pub fn display_label(&self) -> &str {
        if self.label.is_empty() {
            &self.name
        } else {
            &self.label
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FormConfig {
    pub form_id: Option<String>,
    pub form_fields: Vec<FormField>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApprovalConfig {
    pub approvers: Vec<String>,
    pub approval_type: Option<String>,
    pub timeout_hours: Option<u64>,
}

/// How a condition node combines its conditions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionLogic {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConditionConfig {
    pub conditions: Vec<Condition>,
    pub condition_logic: ConditionLogic,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NotificationConfig {
    /// Delivery channel: email, sms, push, webhook.
    pub notification_type: String,
    pub recipients: Vec<String>,
    pub template: String,
}

/// Unit for `delayAmount`. Anything unrecognised means milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayUnit {
    Minutes,
    Hours,
    Days,
    #[default]
    #[serde(other)]
    Milliseconds,
}

impl DelayUnit {
    pub fn millis_per_unit(self) -> u64 {
        match self {
            Self::Minutes => 60 * 1000,
            Self::Hours => 60 * 60 * 1000,
            Self::Days => 24 * 60 * 60 * 1000,
            Self::Milliseconds => 1,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DelayConfig {
    pub delay_amount: f64,
    pub delay_unit: DelayUnit,
}

impl DelayConfig {
    pub fn as_millis(&self) -> u64 {
        if !self.delay_amount.is_finite() || self.delay_amount <= 0.0 {
            return 0;
        }
        (self.delay_amount * self.delay_unit.millis_per_unit() as f64).round() as u64
    }
}

/// Who an assignment node hands the visitor to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentType {
    #[default]
    User,
    Role,
    LoadBalance,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AssignmentConfig {
    pub assignment_type: AssignmentType,
    pub assign_to: Option<String>,
    pub role: Option<String>,
    /// Load-balancing strategy name, e.g. `round_robin`.
    pub strategy: Option<String>,
}

/// Directed edge, optionally guarded. Only consulted when leaving a `condition` node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    #[serde(default)]
    pub id: Option<String>,
    pub from_node: String,
    pub to_node: String,
    #[serde(default)]
    pub condition: Option<Condition>,
}

impl Connection {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            id: None,
            from_node: from.into(),
            to_node: to.into(),
            condition: None,
        }
    }

    pub fn guarded(from: impl Into<String>, to: impl Into<String>, condition: Condition) -> Self {
        Self {
            condition: Some(condition),
            ..Self::new(from, to)
        }
    }
}

/// Comparison operator of a [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    GreaterThan,
    LessThan,
    IsEmpty,
    IsNotEmpty,
    /// Any operator this build does not know. Always evaluates to false.
    #[serde(other)]
    Unknown,
}

/// A field comparison against a literal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: ConditionOperator,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl Condition {
    pub fn new(
        field: impl Into<String>,
        operator: ConditionOperator,
        value: serde_json::Value,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }
}
