//! Step definitions as written in `deployment.yaml`.

use serde::Deserialize;

use super::value::Scalar;

/// One on-chain action of a project.
///
/// The position of a step in the project's step list is its call nonce in managed mode,
/// so the list must not be reordered once it was signed.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawStep")]
pub struct Step {
    pub action: StepAction,
    /// Gas limit override for this step.
    pub gas: Option<u64>,
    /// Wait for all receipts collected so far before submitting the next step.
    pub wait: bool,
    /// Conditions that must all hold for the step to run (standalone projects only).
    pub conditions: Vec<Condition>,
}

impl Step {
    pub fn new(action: StepAction) -> Self {
        Self {
            action,
            gas: None,
            wait: false,
            conditions: Vec::new(),
        }
    }
}

/// The action a step performs, tagged by the `action` field.
#[derive(Debug, Clone)]
pub enum StepAction {
    Create(CreateStep),
    Create2(Create2Step),
    Call(CallStep),
    Publish(PublishStep),
    /// An action this deployer does not know. The step is skipped at deploy time.
    Unknown(String),
}

impl StepAction {
    /// The `action` tag of this step.
    pub fn name(&self) -> &str {
        match self {
            StepAction::Create(_) => "create",
            StepAction::Create2(_) => "create2",
            StepAction::Call(_) => "call",
            StepAction::Publish(_) => "publish",
            StepAction::Unknown(name) => name,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateStep {
    /// Init code, may contain `{...}` placeholders.
    #[serde(default)]
    pub bytecode: String,
    /// ABI-encoded constructor arguments appended to the bytecode.
    #[serde(default)]
    pub constructor: Option<AbiCall>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Create2Step {
    pub salt: Scalar,
    #[serde(default)]
    pub bytecode: String,
    #[serde(default)]
    pub constructor: Option<AbiCall>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallStep {
    /// Target address or reference.
    pub address: String,
    /// Value in wei, or a reference such as `ether:1.5`.
    #[serde(default)]
    pub amount: Scalar,
    /// Raw call data. Takes precedence over `call`.
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub call: Option<AbiCall>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishStep {
    /// A fully signed raw transaction in hex.
    pub transaction: String,
}

/// A function (or constructor) signature together with its argument tree.
#[derive(Debug, Clone, Deserialize)]
pub struct AbiCall {
    /// Human-readable signature, e.g. `transfer(address to, uint256 amount)`.
    pub abi: String,
    #[serde(default)]
    pub args: Vec<AbiArgument>,
}

/// One argument of an [`AbiCall`].
///
/// Nested calls are encoded first and passed as `bytes`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AbiArgument {
    Call(AbiCall),
    List(Vec<AbiArgument>),
    Value(Scalar),
}

/// A `[left, operator, right]` triple gating a standalone step.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Condition(pub Scalar, pub String, pub Scalar);

#[derive(Deserialize)]
struct RawStep {
    action: String,
    #[serde(default)]
    gas: Option<u64>,
    #[serde(default, rename = "await")]
    wait: bool,
    #[serde(default, rename = "if")]
    conditions: Vec<Condition>,
    #[serde(flatten)]
    fields: serde_yaml::Mapping,
}

impl TryFrom<RawStep> for Step {
    type Error = serde_yaml::Error;

    fn try_from(raw: RawStep) -> Result<Self, Self::Error> {
        let fields = serde_yaml::Value::Mapping(raw.fields);
        let action = match raw.action.as_str() {
            "create" => StepAction::Create(serde_yaml::from_value(fields)?),
            "create2" => StepAction::Create2(serde_yaml::from_value(fields)?),
            "call" => StepAction::Call(serde_yaml::from_value(fields)?),
            "publish" => StepAction::Publish(serde_yaml::from_value(fields)?),
            _ => StepAction::Unknown(raw.action),
        };

        Ok(Self {
            action,
            gas: raw.gas,
            wait: raw.wait,
            conditions: raw.conditions,
        })
    }
}
