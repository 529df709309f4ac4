use domain::component::{ComponentHandle, ComponentSpec, Synthesis};
use domain::deferred::{Deferred, Input};
use domain::error::{Result, SynthError};
use domain::link::{permission, LinkDefinition, LinkRef, Linkable};
use domain::ports::backend::{ResourceArgs, ResourceRef};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const MAX_VISIBILITY_TIMEOUT: u32 = 12 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueueArgs {
    pub fifo: bool,
    /// Seconds.
    pub visibility_timeout: u32,
}

impl Default for QueueArgs {
    fn default() -> Self {
        Self {
            fifo: false,
            visibility_timeout: 30,
        }
    }
}

pub struct Queue {
    handle: ComponentHandle,
    name: String,
    queue: ResourceRef,
}

impl Queue {
    pub const KIND: &'static str = "stratus:aws:Queue";
    const LINK_TYPE: &'static str = "stratus.aws.Queue";

    pub fn new(synthesis: &Synthesis, name: &str, args: QueueArgs) -> Result<Self> {
        let args = synthesis.component_args(Self::KIND, args)?;
        if args.visibility_timeout > MAX_VISIBILITY_TIMEOUT {
            return Err(SynthError::invalid_input(
                "visibilityTimeout",
                args.visibility_timeout.to_string(),
                "must be at most 12 hours",
            ));
        }

        let handle = synthesis.register_component(ComponentSpec::new(Self::KIND, name).linkable())?;
        let queue = synthesis.create_resource(
            handle,
            ResourceArgs::new("aws:sqs/queue:Queue", format!("{}Queue", name))
                .input("fifoQueue", Value::Bool(args.fifo))
                .input("visibilityTimeoutSeconds", Value::from(args.visibility_timeout)),
        )?;

        Ok(Self {
            handle,
            name: name.to_string(),
            queue,
        })
    }

    pub fn handle(&self) -> ComponentHandle {
        self.handle
    }

    pub fn queue_name(&self) -> Deferred<String> {
        self.queue.id.clone()
    }

    pub fn arn(&self) -> Deferred<String> {
        self.queue.arn()
    }
}

impl Linkable for Queue {
    fn link_name(&self) -> &str {
        &self.name
    }

    fn link_type(&self) -> &str {
        Self::LINK_TYPE
    }

    fn get_link(&self) -> LinkDefinition {
        LinkDefinition {
            properties: self.queue_name().map(|name| {
                let mut properties = Map::new();
                properties.insert("name".into(), Value::String(name));
                properties
            }),
            include: vec![permission(["sqs:*"], [Input::from(self.arn())])],
        }
    }
}

impl LinkRef for Queue {
    fn reference_name(&self) -> String {
        format!("{} ({})", self.name, Self::KIND)
    }

    fn as_linkable(&self) -> Option<&dyn Linkable> {
        Some(self)
    }
}
