use domain::component::{ComponentHandle, ComponentSpec, Synthesis};
use domain::deferred::{Deferred, Input, Inputs};
use domain::dynamic::DynamicProvider;
use domain::error::{Result, SynthError};
use domain::link::{permission, LinkDefinition, LinkRef, Linkable, PermissionStatement};
use domain::ports::backend::{ResourceArgs, ResourceRef};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use stratus_manifest::RUNTIMES;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FunctionArgs {
    /// `{path}.{export}`, e.g. `src/api.handler`.
    pub handler: String,
    pub runtime: String,
    /// MB.
    pub memory: u32,
    /// Seconds.
    pub timeout: u32,
    pub environment: BTreeMap<String, String>,
}

impl Default for FunctionArgs {
    fn default() -> Self {
        Self {
            handler: String::new(),
            runtime: "nodejs20.x".to_string(),
            memory: 1024,
            timeout: 20,
            environment: BTreeMap::new(),
        }
    }
}

impl FunctionArgs {
    pub fn handler(handler: impl Into<String>) -> Self {
        Self {
            handler: handler.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self.handler.rsplit_once('.') {
            Some((path, export)) if !path.is_empty() && !export.is_empty() && !export.contains('/') => {}
            _ => {
                return Err(SynthError::invalid_input(
                    "handler",
                    &self.handler,
                    "expected \"{path}.{export}\", e.g. \"src/api.handler\"",
                ))
            }
        }
        if !RUNTIMES.contains(&self.runtime.as_str()) {
            return Err(SynthError::invalid_input(
                "runtime",
                &self.runtime,
                format!("expected one of {}", RUNTIMES.join(", ")),
            ));
        }
        if !(128..=10240).contains(&self.memory) {
            return Err(SynthError::invalid_input(
                "memory",
                format!("{} MB", self.memory),
                "must be between 128 MB and 10240 MB",
            ));
        }
        if !(1..=900).contains(&self.timeout) {
            return Err(SynthError::invalid_input(
                "timeout",
                format!("{} seconds", self.timeout),
                "must be between 1 and 900 seconds",
            ));
        }
        Ok(())
    }
}

/// A serverless function. Links become an inline role policy and one
/// environment variable per linked resource.
pub struct Function {
    handle: ComponentHandle,
    name: String,
    function: ResourceRef,
    permissions: Vec<PermissionStatement>,
    links: Vec<String>,
}

impl Function {
    pub const KIND: &'static str = "stratus:aws:Function";
    const LINK_TYPE: &'static str = "stratus.aws.Function";

    pub fn new(
        synthesis: &Synthesis,
        name: &str,
        args: FunctionArgs,
        links: &[&dyn LinkRef],
    ) -> Result<Self> {
        let args = synthesis.component_args(Self::KIND, args)?;
        args.validate()?;

        let handle = synthesis.register_component(ComponentSpec::new(Self::KIND, name).linkable())?;
        let bundle = synthesis.build_links(links)?;

        let role = synthesis.create_resource(
            handle,
            ResourceArgs::new("aws:iam/role:Role", format!("{}Role", name)).input(
                "assumeRolePolicy",
                json!({
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Principal": { "Service": "lambda.amazonaws.com" },
                        "Action": "sts:AssumeRole",
                    }],
                }),
            ),
        )?;

        let mut function_args = ResourceArgs::new("aws:lambda/function:Function", format!("{}Function", name));
        if !bundle.permissions().is_empty() {
            let policy = synthesis.create_resource(
                handle,
                ResourceArgs::new("aws:iam/rolePolicy:RolePolicy", format!("{}LinkPolicy", name))
                    .input("role", role.id.clone())
                    .input("policy", bundle.policy_document())
                    .depends_on(role.urn.clone()),
            )?;
            function_args = function_args.depends_on(policy.urn);
        }

        let overrides = args.environment.clone();
        let environment = bundle.environment().map(move |mut variables| {
            variables.extend(overrides);
            variables
        });
        synthesis.register_receiver(&args.handler, bundle.names(), environment.clone());

        let function = synthesis.create_resource(
            handle,
            function_args
                .input("handler", Value::String(args.handler.clone()))
                .input("runtime", Value::String(args.runtime.clone()))
                .input("memorySize", Value::from(args.memory))
                .input("timeout", Value::from(args.timeout))
                .input("role", role.arn())
                .input("environment", environment.map(|variables| json!({ "variables": variables })))
                .depends_on(role.urn.clone()),
        )?;

        Ok(Self {
            handle,
            name: name.to_string(),
            function,
            permissions: bundle.permissions().to_vec(),
            links: bundle.names(),
        })
    }

    pub fn handle(&self) -> ComponentHandle {
        self.handle
    }

    pub fn function_name(&self) -> Deferred<String> {
        self.function.id.clone()
    }

    pub fn arn(&self) -> Deferred<String> {
        self.function.arn()
    }

    /// Statements granted through links, in link order.
    pub fn permissions(&self) -> &[PermissionStatement] {
        &self.permissions
    }

    pub fn links(&self) -> &[String] {
        &self.links
    }

    /// Pushes a code bundle once the function exists.
    pub fn deploy_code(
        &self,
        synthesis: &Synthesis,
        provider: Arc<dyn DynamicProvider>,
        bucket: Input<String>,
        key: Input<String>,
    ) -> Result<ResourceRef> {
        let mut inputs = Inputs::new();
        inputs.insert("functionName".into(), self.function.id.clone().into());
        inputs.insert("s3Bucket".into(), bucket.map(Value::String));
        inputs.insert("s3Key".into(), key.map(Value::String));
        synthesis.create_dynamic(
            self.handle,
            &format!("{}Code", self.name),
            provider,
            inputs,
            &[self.function.urn.clone()],
        )
    }
}

impl Linkable for Function {
    fn link_name(&self) -> &str {
        &self.name
    }

    fn link_type(&self) -> &str {
        Self::LINK_TYPE
    }

    fn get_link(&self) -> LinkDefinition {
        LinkDefinition {
            properties: self.function_name().map(|name| {
                let mut properties = Map::new();
                properties.insert("name".into(), Value::String(name));
                properties
            }),
            include: vec![permission(["lambda:InvokeFunction"], [Input::from(self.arn())])],
        }
    }
}

impl LinkRef for Function {
    fn reference_name(&self) -> String {
        format!("{} ({})", self.name, Self::KIND)
    }

    fn as_linkable(&self) -> Option<&dyn Linkable> {
        Some(self)
    }
}
