use domain::component::{ComponentHandle, ComponentSpec, Synthesis};
use domain::deferred::{Deferred, Input, Template};
use domain::error::Result;
use domain::link::{permission, LinkDefinition, LinkRef, Linkable};
use domain::ports::backend::{ResourceArgs, ResourceRef};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

const BUCKET_NAME_LENGTH: usize = 63;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BucketArgs {
    pub versioning: bool,
    /// Skip the public access block.
    pub public: bool,
}

/// An object storage bucket. Linking grants full access to the bucket and
/// its objects.
pub struct Bucket {
    handle: ComponentHandle,
    name: String,
    bucket: ResourceRef,
}

impl Bucket {
    pub const KIND: &'static str = "stratus:aws:Bucket";
    const LINK_TYPE: &'static str = "stratus.aws.Bucket";

    pub fn new(synthesis: &Synthesis, name: &str, args: BucketArgs) -> Result<Self> {
        let args = synthesis.component_args(Self::KIND, args)?;
        let handle = synthesis.register_component(ComponentSpec::new(Self::KIND, name).linkable())?;

        let physical = synthesis
            .naming()
            .prefix_name(BUCKET_NAME_LENGTH, name, "")?
            .to_lowercase();
        let bucket = synthesis.create_resource(
            handle,
            ResourceArgs::new("aws:s3/bucketV2:BucketV2", format!("{}Bucket", name))
                .input("bucket", Value::String(physical))
                .input("forceDestroy", Value::Bool(true)),
        )?;

        if args.versioning {
            synthesis.create_resource(
                handle,
                ResourceArgs::new(
                    "aws:s3/bucketVersioningV2:BucketVersioningV2",
                    format!("{}Versioning", name),
                )
                .input("bucket", bucket.id.clone())
                .input("versioningConfiguration", json!({ "status": "Enabled" }))
                .depends_on(bucket.urn.clone()),
            )?;
        }

        if !args.public {
            synthesis.create_resource(
                handle,
                ResourceArgs::new(
                    "aws:s3/bucketPublicAccessBlock:BucketPublicAccessBlock",
                    format!("{}PublicAccessBlock", name),
                )
                .input("bucket", bucket.id.clone())
                .input("blockPublicAcls", Value::Bool(true))
                .input("blockPublicPolicy", Value::Bool(true))
                .input("ignorePublicAcls", Value::Bool(true))
                .input("restrictPublicBuckets", Value::Bool(true))
                .depends_on(bucket.urn.clone()),
            )?;
        }

        Ok(Self {
            handle,
            name: name.to_string(),
            bucket,
        })
    }

    pub fn handle(&self) -> ComponentHandle {
        self.handle
    }

    pub fn bucket_name(&self) -> Deferred<String> {
        self.bucket.id.clone()
    }

    pub fn arn(&self) -> Deferred<String> {
        self.bucket.arn()
    }

    pub fn resource(&self) -> &ResourceRef {
        &self.bucket
    }
}

impl Linkable for Bucket {
    fn link_name(&self) -> &str {
        &self.name
    }

    fn link_type(&self) -> &str {
        Self::LINK_TYPE
    }

    fn get_link(&self) -> LinkDefinition {
        let arn = self.arn();
        let objects = Template::new().value(&arn).lit("/*").build();
        LinkDefinition {
            properties: self.bucket_name().map(|name| {
                let mut properties = Map::new();
                properties.insert("name".into(), Value::String(name));
                properties
            }),
            include: vec![permission(["s3:*"], [Input::from(arn), Input::from(objects)])],
        }
    }
}

impl LinkRef for Bucket {
    fn reference_name(&self) -> String {
        format!("{} ({})", self.name, Self::KIND)
    }

    fn as_linkable(&self) -> Option<&dyn Linkable> {
        Some(self)
    }
}
