use crate::error::{Result, SynthError};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Alphabet for generated identifiers. Omits characters that are easy to
/// confuse when read aloud or in a console (`g`/`9`, `i`/`l`/`1`, `j`, `p`, `q`, `y`).
pub const PRETTY_CHARS: &str = "abcdefhkmnorstuvwxz";

/// Length of the hash appended to truncated physical names.
pub const NAME_HASH_LENGTH: usize = 8;

/// Renders `number` in the pretty alphabet, truncated or left-padded with `s`
/// to exactly `length` characters.
pub fn hash_number_to_pretty_string(number: u64, length: usize) -> String {
    let chars = PRETTY_CHARS.as_bytes();
    let base = chars.len() as u64;
    let mut digits = Vec::new();
    let mut n = number;
    while n > 0 {
        digits.push(chars[(n % base) as usize]);
        n /= base;
    }
    digits.reverse();
    digits.truncate(length);

    let mut hash = String::with_capacity(length);
    for _ in digits.len()..length {
        hash.push('s');
    }
    hash.extend(digits.into_iter().map(char::from));
    hash
}

/// Stable short identifier for arbitrary input.
pub fn hash_string_to_pretty_string(input: &str, length: usize) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    hash_number_to_pretty_string(u64::from_be_bytes(prefix), length)
}

fn sanitize(input: &str) -> String {
    input.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

fn sanitize_segment(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect()
}

/// Derives physical names from logical ones for one app and stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingAuthority {
    app: String,
    stage: String,
    region: Option<String>,
}

impl NamingAuthority {
    pub fn new(app: &str, stage: &str) -> Self {
        Self {
            app: sanitize_segment(app),
            stage: sanitize_segment(stage),
            region: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn app(&self) -> &str {
        &self.app
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// `{app}-{stage}-{name}{suffix}`, or when that exceeds `max_length`, the
    /// longest prefix of it that still fits followed by `-{hash}{suffix}`. The
    /// hash covers the whole untruncated name, so names that only differ in the
    /// dropped tail still come out distinct.
    ///
    /// Characters outside `[A-Za-z0-9]` are dropped from the name. A name that
    /// loses characters this way always carries the hash of its original
    /// spelling, so `Web-A` and `WebA` stay distinct.
    pub fn prefix_name(&self, max_length: usize, logical_name: &str, suffix: &str) -> Result<String> {
        let clean = sanitize(logical_name);
        let full = format!("{}-{}-{}", self.app, self.stage, clean);
        let altered = clean != logical_name;
        if !altered && full.len() + suffix.len() <= max_length {
            return Ok(format!("{}{}", full, suffix));
        }

        let reserved = suffix.len() + NAME_HASH_LENGTH;
        if max_length < reserved {
            return Err(SynthError::invalid_input(
                "max length",
                max_length.to_string(),
                format!("too short to hold a {}-character hash and \"{}\"", NAME_HASH_LENGTH, suffix),
            ));
        }

        let original = format!("{}-{}-{}", self.app, self.stage, logical_name);
        let hash = hash_string_to_pretty_string(&original, NAME_HASH_LENGTH);
        // `full` is ASCII, byte slicing is safe.
        let keep = (max_length - reserved).saturating_sub(1);
        let kept = full[..keep.min(full.len())].trim_end_matches('-');
        if kept.is_empty() {
            Ok(format!("{}{}", hash, suffix))
        } else {
            Ok(format!("{}-{}{}", kept, hash, suffix))
        }
    }

    /// Suffix distinguishing per-region copies of global resources, e.g. `-useast1`.
    pub fn region_suffix(&self) -> String {
        match &self.region {
            Some(region) => format!("-{}", region.to_lowercase().replace('-', "")),
            None => String::new(),
        }
    }

    /// Stable identity of a resource within the deployment.
    pub fn urn(&self, resource_type: &str, name: &str) -> String {
        format!("urn:stratus:{}:{}::{}::{}", self.stage, self.app, resource_type, name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameCase {
    Preserve,
    Lower,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameSuffix {
    None,
    /// `.fifo` when the boolean input of that name is true.
    FifoWhen(String),
    /// The authority's region suffix.
    Region,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameTarget {
    /// The physical name lives in a plain input field.
    Field(String),
    /// The physical name is the `Name` entry of the `tags` input.
    TagName,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingRule {
    pub types: Vec<String>,
    pub target: NameTarget,
    pub max_length: usize,
    pub case: NameCase,
    pub suffix: NameSuffix,
    /// Replace `-` with `_` for backends that reject dashes.
    pub underscores: bool,
}

impl NamingRule {
    pub fn field(types: &[&str], field: &str, max_length: usize) -> Self {
        Self {
            types: types.iter().map(|t| t.to_string()).collect(),
            target: NameTarget::Field(field.to_string()),
            max_length,
            case: NameCase::Preserve,
            suffix: NameSuffix::None,
            underscores: false,
        }
    }

    pub fn tags(types: &[&str], max_length: usize) -> Self {
        Self {
            target: NameTarget::TagName,
            ..Self::field(types, "tags", max_length)
        }
    }

    pub fn lowercase(mut self) -> Self {
        self.case = NameCase::Lower;
        self
    }

    pub fn with_suffix(mut self, suffix: NameSuffix) -> Self {
        self.suffix = suffix;
        self
    }

    pub fn with_underscores(mut self) -> Self {
        self.underscores = true;
        self
    }

    /// Applies case and separator rules to a name produced by `prefix_name`.
    pub fn finish(&self, name: String) -> String {
        let name = match self.case {
            NameCase::Preserve => name,
            NameCase::Lower => name.to_lowercase(),
        };
        if self.underscores {
            name.replace('-', "_")
        } else {
            name
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingLookup<'a> {
    /// Named manually or never prefixed.
    Exempt,
    Rule(&'a NamingRule),
    Unknown,
}

/// Provider type → physical name rule. Configuration data, not engine logic.
#[derive(Debug, Clone, Default)]
pub struct NamingTable {
    rules: Vec<NamingRule>,
    exempt: HashSet<String>,
    exempt_prefixes: Vec<String>,
}

impl NamingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, rule: NamingRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn exempt(mut self, resource_type: impl Into<String>) -> Self {
        self.exempt.insert(resource_type.into());
        self
    }

    pub fn exempt_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.exempt_prefixes.push(prefix.into());
        self
    }

    pub fn lookup(&self, resource_type: &str) -> NamingLookup<'_> {
        if self.exempt.contains(resource_type)
            || self.exempt_prefixes.iter().any(|p| resource_type.starts_with(p))
        {
            return NamingLookup::Exempt;
        }
        match self.rules.iter().find(|r| r.types.iter().any(|t| t == resource_type)) {
            Some(rule) => NamingLookup::Rule(rule),
            None => NamingLookup::Unknown,
        }
    }

    /// The AWS and Cloudflare rule set.
    pub fn aws_defaults() -> Self {
        let mut table = Self::new()
            .exempt_prefix("stratus:")
            .with_rule(NamingRule::field(&["aws:lb/loadBalancer:LoadBalancer"], "name", 24))
            .with_rule(NamingRule::field(&["aws:rds/proxy:Proxy"], "name", 60).lowercase())
            .with_rule(
                NamingRule::field(&["aws:rds/cluster:Cluster"], "clusterIdentifier", 63).lowercase(),
            )
            .with_rule(
                NamingRule::field(
                    &["aws:rds/clusterInstance:ClusterInstance", "aws:rds/instance:Instance"],
                    "identifier",
                    63,
                )
                .lowercase(),
            )
            .with_rule(NamingRule::field(
                &[
                    "aws:cloudfront/function:Function",
                    "aws:iam/user:User",
                    "aws:lambda/function:Function",
                ],
                "name",
                64,
            ))
            .with_rule(
                NamingRule::field(&["aws:sqs/queue:Queue"], "name", 80)
                    .with_suffix(NameSuffix::FifoWhen("fifoQueue".into())),
            )
            .with_rule(NamingRule::field(&["aws:iam/role:Role"], "name", 64).with_suffix(NameSuffix::Region))
            .with_rule(NamingRule::field(
                &[
                    "aws:apigateway/authorizer:Authorizer",
                    "aws:apigateway/restApi:RestApi",
                    "aws:apigatewayv2/api:Api",
                    "aws:apigatewayv2/authorizer:Authorizer",
                    "aws:apigatewayv2/vpcLink:VpcLink",
                    "aws:cognito/userPool:UserPool",
                    "aws:iot/authorizer:Authorizer",
                ],
                "name",
                128,
            ))
            .with_rule(NamingRule::field(&["aws:iot/topicRule:TopicRule"], "name", 128).with_underscores())
            .with_rule(NamingRule::field(
                &[
                    "aws:appautoscaling/policy:Policy",
                    "aws:dynamodb/table:Table",
                    "aws:kinesis/stream:Stream",
                    "aws:ecs/cluster:Cluster",
                ],
                "name",
                255,
            ))
            .with_rule(
                NamingRule::field(
                    &[
                        "aws:elasticache/subnetGroup:SubnetGroup",
                        "aws:rds/parameterGroup:ParameterGroup",
                        "aws:rds/subnetGroup:SubnetGroup",
                    ],
                    "name",
                    255,
                )
                .lowercase(),
            )
            .with_rule(NamingRule::field(&["aws:ec2/keyPair:KeyPair"], "keyName", 255))
            .with_rule(NamingRule::tags(
                &[
                    "aws:ec2/eip:Eip",
                    "aws:ec2/instance:Instance",
                    "aws:ec2/internetGateway:InternetGateway",
                    "aws:ec2/natGateway:NatGateway",
                    "aws:ec2/routeTable:RouteTable",
                    "aws:ec2/securityGroup:SecurityGroup",
                    "aws:ec2/defaultSecurityGroup:DefaultSecurityGroup",
                    "aws:ec2/subnet:Subnet",
                    "aws:ec2/vpc:Vpc",
                ],
                255,
            ))
            .with_rule(
                NamingRule::field(&["aws:sns/topic:Topic"], "name", 256)
                    .with_suffix(NameSuffix::FifoWhen("fifoTopic".into())),
            )
            .with_rule(NamingRule::field(&["aws:secretsmanager/secret:Secret"], "name", 512))
            .with_rule(NamingRule::field(&["aws:appsync/graphQLApi:GraphQLApi"], "name", 65536))
            .with_rule(
                NamingRule::field(
                    &[
                        "cloudflare:index/d1Database:D1Database",
                        "cloudflare:index/r2Bucket:R2Bucket",
                        "cloudflare:index/workerScript:WorkerScript",
                        "cloudflare:index/queue:Queue",
                    ],
                    "name",
                    64,
                )
                .lowercase(),
            )
            .with_rule(
                NamingRule::field(&["cloudflare:index/workersKvNamespace:WorkersKvNamespace"], "title", 64)
                    .lowercase(),
            );

        for resource_type in MANUALLY_NAMED.iter().chain(NEVER_PREFIXED.iter()) {
            table = table.exempt(*resource_type);
        }
        table
    }
}

const MANUALLY_NAMED: &[&str] = &[
    "aws:appsync/dataSource:DataSource",
    "aws:appsync/function:Function",
    "aws:appsync/resolver:Resolver",
    "aws:cloudwatch/eventBus:EventBus",
    "aws:cognito/identityPool:IdentityPool",
    "aws:ecs/service:Service",
    "aws:ecs/taskDefinition:TaskDefinition",
    "aws:lb/targetGroup:TargetGroup",
    "aws:s3/bucketV2:BucketV2",
    "aws:servicediscovery/privateDnsNamespace:PrivateDnsNamespace",
    "aws:servicediscovery/service:Service",
    "random:index/randomId:RandomId",
    "random:index/randomPassword:RandomPassword",
    "tls:index/privateKey:PrivateKey",
];

const NEVER_PREFIXED: &[&str] = &[
    "aws:acm/certificate:Certificate",
    "aws:acm/certificateValidation:CertificateValidation",
    "aws:apigateway/basePathMapping:BasePathMapping",
    "aws:apigateway/deployment:Deployment",
    "aws:apigateway/domainName:DomainName",
    "aws:apigateway/integration:Integration",
    "aws:apigateway/integrationResponse:IntegrationResponse",
    "aws:apigateway/method:Method",
    "aws:apigateway/methodResponse:MethodResponse",
    "aws:apigateway/resource:Resource",
    "aws:apigateway/response:Response",
    "aws:apigateway/stage:Stage",
    "aws:apigatewayv2/apiMapping:ApiMapping",
    "aws:apigatewayv2/domainName:DomainName",
    "aws:apigatewayv2/integration:Integration",
    "aws:apigatewayv2/route:Route",
    "aws:apigatewayv2/stage:Stage",
    "aws:appautoscaling/target:Target",
    "aws:appsync/domainName:DomainName",
    "aws:appsync/domainNameApiAssociation:DomainNameApiAssociation",
    "aws:ec2/routeTableAssociation:RouteTableAssociation",
    "aws:iam/accessKey:AccessKey",
    "aws:iam/instanceProfile:InstanceProfile",
    "aws:iam/policy:Policy",
    "aws:iam/rolePolicy:RolePolicy",
    "aws:iam/rolePolicyAttachment:RolePolicyAttachment",
    "aws:iam/userPolicy:UserPolicy",
    "aws:cloudfront/cachePolicy:CachePolicy",
    "aws:cloudfront/distribution:Distribution",
    "aws:cloudwatch/eventRule:EventRule",
    "aws:cloudwatch/eventTarget:EventTarget",
    "aws:cloudwatch/logGroup:LogGroup",
    "aws:cognito/identityPoolRoleAttachment:IdentityPoolRoleAttachment",
    "aws:cognito/identityProvider:IdentityProvider",
    "aws:cognito/userPoolClient:UserPoolClient",
    "aws:elasticache/replicationGroup:ReplicationGroup",
    "aws:lambda/eventSourceMapping:EventSourceMapping",
    "aws:lambda/functionUrl:FunctionUrl",
    "aws:lambda/invocation:Invocation",
    "aws:lambda/permission:Permission",
    "aws:lambda/provisionedConcurrencyConfig:ProvisionedConcurrencyConfig",
    "aws:lb/listener:Listener",
    "aws:rds/proxyDefaultTargetGroup:ProxyDefaultTargetGroup",
    "aws:rds/proxyTarget:ProxyTarget",
    "aws:route53/record:Record",
    "aws:s3/bucketCorsConfigurationV2:BucketCorsConfigurationV2",
    "aws:s3/bucketNotification:BucketNotification",
    "aws:s3/bucketObject:BucketObject",
    "aws:s3/bucketObjectv2:BucketObjectv2",
    "aws:s3/bucketPolicy:BucketPolicy",
    "aws:s3/bucketPublicAccessBlock:BucketPublicAccessBlock",
    "aws:s3/bucketVersioningV2:BucketVersioningV2",
    "aws:s3/bucketWebsiteConfigurationV2:BucketWebsiteConfigurationV2",
    "aws:secretsmanager/secretVersion:SecretVersion",
    "aws:ses/domainIdentityVerification:DomainIdentityVerification",
    "aws:sesv2/emailIdentity:EmailIdentity",
    "aws:sns/topicSubscription:TopicSubscription",
    "cloudflare:index/record:Record",
    "cloudflare:index/workerCronTrigger:WorkerCronTrigger",
    "cloudflare:index/workerDomain:WorkerDomain",
    "docker-build:index:Image",
    "vercel:index/dnsRecord:DnsRecord",
];
