//! AWS SSM Parameter Store.

use super::classify;
use crate::backend::{
    Page, ParameterFilter, ParameterStore, ParameterType, PutParameterRequest, Tags,
};
use crate::{Result, SenvarError};
use async_trait::async_trait;
use aws_sdk_ssm::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_ssm::types::{
    ParameterStringFilter, ParameterType as SsmParameterType, ResourceTypeForTagging, Tag,
};
use aws_sdk_ssm::Client;

const EXISTS: &[&str] = &["ParameterAlreadyExists"];
const MISSING: &[&str] = &["ParameterNotFound", "InvalidResourceId"];

/// Page size requested from `DescribeParameters`.
const LIST_PAGE_SIZE: i32 = 50;

fn sdk_error<E, R>(name: &str, err: SdkError<E, R>) -> SenvarError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    classify(name, err.code(), DisplayErrorContext(&err).to_string(), EXISTS, MISSING)
}

fn ssm_tags(tags: &Tags) -> Result<Vec<Tag>> {
    tags.iter()
        .map(|(key, value)| {
            Tag::builder()
                .key(key)
                .value(value)
                .build()
                .map_err(|e| SenvarError::Other(anyhow::anyhow!("invalid tag {}: {}", key, e)))
        })
        .collect()
}

fn ssm_filter(filter: &ParameterFilter) -> Result<ParameterStringFilter> {
    let builder = match filter {
        ParameterFilter::NameBeginsWith(prefix) => ParameterStringFilter::builder()
            .key("Name")
            .option("BeginsWith")
            .values(prefix),
        ParameterFilter::TagEquals { key, value } => ParameterStringFilter::builder()
            .key(format!("tag:{}", key))
            .option("Equals")
            .values(value),
    };
    builder
        .build()
        .map_err(|e| SenvarError::Other(anyhow::anyhow!("invalid parameter filter: {}", e)))
}

/// [`ParameterStore`] backed by AWS Systems Manager Parameter Store.
#[derive(Clone)]
pub struct SsmParameterStore {
    client: Client,
}

impl SsmParameterStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ParameterStore for SsmParameterStore {
    fn name(&self) -> &str {
        "ssm"
    }

    async fn put_parameter(&self, request: &PutParameterRequest) -> Result<()> {
        let kind = match request.kind {
            ParameterType::String => SsmParameterType::String,
            ParameterType::SecureString => SsmParameterType::SecureString,
        };
        let tags = ssm_tags(&request.tags)?;

        self.client
            .put_parameter()
            .name(&request.name)
            .value(&request.value)
            .r#type(kind)
            .overwrite(request.overwrite)
            .set_tags((!tags.is_empty()).then_some(tags))
            .send()
            .await
            .map_err(|e| sdk_error(&request.name, e))?;

        Ok(())
    }

    async fn add_tags_to_resource(&self, name: &str, tags: &Tags) -> Result<()> {
        self.client
            .add_tags_to_resource()
            .resource_type(ResourceTypeForTagging::Parameter)
            .resource_id(name)
            .set_tags(Some(ssm_tags(tags)?))
            .send()
            .await
            .map_err(|e| sdk_error(name, e))?;

        Ok(())
    }

    async fn get_parameter(&self, name: &str, with_decryption: bool) -> Result<Option<String>> {
        let response = self
            .client
            .get_parameter()
            .name(name)
            .with_decryption(with_decryption)
            .send()
            .await
            .map_err(|e| sdk_error(name, e))?;

        Ok(response
            .parameter()
            .and_then(|parameter| parameter.value())
            .map(str::to_string))
    }

    async fn delete_parameter(&self, name: &str) -> Result<()> {
        self.client
            .delete_parameter()
            .name(name)
            .send()
            .await
            .map_err(|e| sdk_error(name, e))?;

        Ok(())
    }

    async fn describe_parameters(
        &self,
        filters: &[ParameterFilter],
        next_token: Option<&str>,
    ) -> Result<Page<String>> {
        let filters = filters.iter().map(ssm_filter).collect::<Result<Vec<_>>>()?;

        let mut request = self
            .client
            .describe_parameters()
            .max_results(LIST_PAGE_SIZE)
            .set_parameter_filters((!filters.is_empty()).then_some(filters));
        if let Some(token) = next_token {
            request = request.next_token(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| sdk_error("*", e))?;

        Ok(Page {
            items: response
                .parameters()
                .iter()
                .filter_map(|parameter| parameter.name().map(str::to_string))
                .collect(),
            next_token: response.next_token().map(str::to_string),
        })
    }
}
