use super::DriveContext;
use super::auth::{ClientCredentialsAuth, TokenProvider};
use super::types::{ChildrenResponse, DrivesResponse, GraphDriveItem, GraphSite};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{ChunkDescriptor, DriveItem, Listing, chunk::parse_cell};
use crate::retry::{
    PollSpec, RetryPolicy, execute, execute_with_diagnostics, poll_until_available,
    update_chunks,
};
use crate::transport::{ApiRequest, ApiResponse, ReqwestTransport, Transport};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};
use url::Url;

const V1: &str = "v1.0";
const BETA: &str = "beta";
const NOT_FOUND: u16 = 404;

pub struct GraphClient {
    transport: Box<dyn Transport>,
    clock: Box<dyn Clock>,
    access_token: String,
    base_url: Url,
    policy: RetryPolicy,
}

impl GraphClient {
    /// Create a new GraphClient with an app-only access token
    #[instrument(name = "Authenticating to Microsoft Graph", skip_all)]
    pub async fn new(config: &Config) -> Result<Self> {
        let auth = ClientCredentialsAuth::new(&config.graph)?;
        Self::from_parts(
            ReqwestTransport::default(),
            SystemClock,
            &auth,
            &config.graph.base_url,
            config.retry.policy()?,
        )
        .await
    }

    pub async fn from_parts(
        transport: impl Transport + 'static,
        clock: impl Clock + 'static,
        tokens: &dyn TokenProvider,
        base_url: &str,
        policy: RetryPolicy,
    ) -> Result<Self> {
        policy.validate()?;
        let base_url = Url::parse(base_url)
            .map_err(|e| AppError::Config(format!("Invalid Graph base URL '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::Config(format!(
                "Invalid Graph base URL '{}'",
                base_url
            )));
        }

        Ok(Self {
            transport: Box::new(transport),
            clock: Box::new(clock),
            access_token: tokens.access_token().await?,
            base_url,
            policy,
        })
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn endpoint<I>(&self, version: &str, segments: I) -> Result<Url>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Config(format!("Invalid Graph base URL '{}'", self.base_url)))?
            .pop_if_empty()
            .push(version)
            .extend(segments);
        Ok(url)
    }

    /// Send with the configured retry policy.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let request = request.bearer(&self.access_token);
        execute(self.clock.as_ref(), &self.policy, || {
            self.transport.send(request.clone())
        })
        .await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        self.send(ApiRequest::get(url)).await?.json()
    }

    #[instrument(name = "Resolving site", skip(self))]
    pub async fn site_id(&self, domain: &str, site: &str) -> Result<String> {
        let mut segments = vec!["sites".to_string(), format!("{}:", domain)];
        segments.extend(path_segments(site));

        let site: GraphSite = self.get_json(self.endpoint(V1, segments)?).await?;
        if site.id.is_empty() {
            return Err(AppError::Graph("Site ID not found in response".to_string()));
        }

        // Composite ids look like "host,collection-id,site-id"
        Ok(match site.id.split_once(',') {
            Some((_, rest)) => rest.to_string(),
            None => site.id,
        })
    }

    #[instrument(name = "Listing drives", skip(self))]
    pub async fn drives(&self, site_id: &str) -> Result<HashMap<String, String>> {
        let response: DrivesResponse = self
            .get_json(self.endpoint(V1, ["sites", site_id, "drives"])?)
            .await?;

        Ok(response
            .value
            .into_iter()
            .map(|drive| (drive.name, drive.id))
            .collect())
    }

    pub async fn resolve_drive(
        &self,
        domain: &str,
        site: &str,
        drive_name: &str,
    ) -> Result<DriveContext> {
        let site_id = self.site_id(domain, site).await?;
        let drive_id = self
            .drives(&site_id)
            .await?
            .remove(drive_name)
            .ok_or_else(|| AppError::Graph(format!("Drive '{}' not found", drive_name)))?;

        debug!(%site_id, %drive_id, "Resolved document library");
        Ok(DriveContext { site_id, drive_id })
    }

    #[instrument(name = "Listing directory", skip(self, ctx))]
    pub async fn list_directory(&self, ctx: &DriveContext, path: &str) -> Result<Listing> {
        let response: ChildrenResponse = self
            .get_json(self.endpoint(V1, by_path(ctx, path, Some("children")))?)
            .await?;

        Ok(Listing::from_items(
            response.value.into_iter().filter_map(DriveItem::from_graph),
        ))
    }

    pub async fn most_recent_file(&self, ctx: &DriveContext, path: &str) -> Result<DriveItem> {
        self.list_directory(ctx, path)
            .await?
            .most_recent_file()
            .cloned()
            .ok_or_else(|| AppError::Graph(format!("No files found in '{}'", path)))
    }

    pub async fn most_recent_folder(&self, ctx: &DriveContext, path: &str) -> Result<DriveItem> {
        self.list_directory(ctx, path)
            .await?
            .most_recent_folder()
            .cloned()
            .ok_or_else(|| AppError::Graph(format!("No folders found in '{}'", path)))
    }

    pub async fn item_by_path(
        &self,
        ctx: &DriveContext,
        folder: &str,
        name: &str,
    ) -> Result<DriveItem> {
        let item: GraphDriveItem = self
            .get_json(self.endpoint(V1, by_path(ctx, &join_path(folder, name), None))?)
            .await?;
        into_drive_item(item)
    }

    /// Single-attempt lookup; a missing item is `Ok(None)`.
    async fn lookup_item(
        &self,
        ctx: &DriveContext,
        folder: &str,
        name: &str,
    ) -> Result<Option<DriveItem>> {
        let url = self.endpoint(V1, by_path(ctx, &join_path(folder, name), None))?;
        let response = self
            .transport
            .send(ApiRequest::get(url).bearer(&self.access_token))
            .await?;

        match response.status {
            status if (self.policy.is_success)(status) => {
                into_drive_item(response.json()?).map(Some)
            }
            NOT_FOUND => Ok(None),
            status => Err(AppError::NonRetryable {
                status_code: status,
                body: response.text().into_owned(),
            }),
        }
    }

    /// Wait until `folder/name` is visible in the library.
    #[instrument(name = "Waiting for file", skip(self, ctx, spec))]
    pub async fn wait_for_file(
        &self,
        ctx: &DriveContext,
        folder: &str,
        name: &str,
        spec: &PollSpec,
    ) -> Result<DriveItem> {
        let resource_id = join_path(folder, name);
        let item = poll_until_available(self.clock.as_ref(), spec, &resource_id, || {
            self.lookup_item(ctx, folder, name)
        })
        .await?;

        info!(name, "File is now available");
        Ok(item)
    }

    /// Download from a pre-authenticated URL into `dir`, returning the file path.
    #[instrument(name = "Downloading file", skip(self, download_url))]
    pub async fn download_to(
        &self,
        download_url: &str,
        file_name: &str,
        dir: &Path,
    ) -> Result<PathBuf> {
        let url = Url::parse(download_url)
            .map_err(|e| AppError::Graph(format!("Invalid download URL: {}", e)))?;
        let response = self.send(ApiRequest::get(url)).await?;

        fs::create_dir_all(dir)?;
        let path = dir.join(file_name);
        fs::write(&path, &response.body)?;

        info!(path = ?path, "File saved");
        Ok(path)
    }

    #[instrument(name = "Downloading file content", skip(self, ctx))]
    pub async fn download_file_content(
        &self,
        ctx: &DriveContext,
        folder: &str,
        name: &str,
    ) -> Result<Vec<u8>> {
        let item = self.item_by_path(ctx, folder, name).await?;
        let url = self.endpoint(V1, item_segments(ctx, &item.id, ["content"]))?;
        Ok(self.send(ApiRequest::get(url)).await?.body)
    }

    #[instrument(name = "Uploading file", skip(self, ctx, data))]
    pub async fn upload_file(
        &self,
        ctx: &DriveContext,
        folder: &str,
        name: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        let url = self.endpoint(V1, by_path(ctx, &join_path(folder, name), Some("content")))?;
        self.send(ApiRequest::put(url).bytes(data, content_type)).await?;

        info!(name, "File uploaded");
        Ok(())
    }

    #[instrument(name = "Deleting item", skip_all, fields(name = %item.name))]
    pub async fn delete_item(&self, ctx: &DriveContext, item: &DriveItem) -> Result<()> {
        let url = self.endpoint(V1, item_segments(ctx, &item.id, std::iter::empty::<&str>()))?;
        self.send(ApiRequest::delete(url)).await?;

        info!("Item deleted");
        Ok(())
    }

    fn range_url(
        &self,
        ctx: &DriveContext,
        item_id: &str,
        sheet: &str,
        address: &str,
        action: Option<&str>,
    ) -> Result<Url> {
        let mut segments = worksheet_segments(ctx, item_id, sheet);
        segments.push(format!("range(address='{}')", odata_literal(address)));
        segments.extend(action.map(str::to_string));
        self.endpoint(V1, segments)
    }

    #[instrument(name = "Clearing range", skip(self, ctx))]
    pub async fn clear_range(
        &self,
        ctx: &DriveContext,
        item_id: &str,
        sheet: &str,
        range: &str,
    ) -> Result<()> {
        let url = self.range_url(ctx, item_id, sheet, range, Some("clear"))?;
        self.send(ApiRequest::post(url)).await?;

        info!("Range cleared");
        Ok(())
    }

    #[instrument(name = "Setting number format", skip(self, ctx))]
    pub async fn set_number_format(
        &self,
        ctx: &DriveContext,
        item_id: &str,
        sheet: &str,
        range: &str,
        number_format: &str,
    ) -> Result<()> {
        let url = self.range_url(ctx, item_id, sheet, range, Some("format"))?;
        let body = json!({ "numberFormat": { "format": number_format } });
        self.send(ApiRequest::patch(url).json(body)).await?;

        info!("Number format updated");
        Ok(())
    }

    #[instrument(name = "Updating range", skip(self, ctx, values))]
    pub async fn update_range(
        &self,
        ctx: &DriveContext,
        item_id: &str,
        sheet: &str,
        address: &str,
        values: &[Vec<Value>],
    ) -> Result<()> {
        let url = self.range_url(ctx, item_id, sheet, address, None)?;
        self.send(ApiRequest::patch(url).json(json!({ "values": values }))).await?;
        Ok(())
    }

    /// Write `rows` starting at `first_cell`, `chunk_rows` rows per request.
    ///
    /// Chunks are written in order and the first failing chunk aborts the job.
    #[instrument(name = "Writing rows", skip(self, ctx, rows), fields(rows = rows.len()))]
    pub async fn write_rows(
        &self,
        ctx: &DriveContext,
        item_id: &str,
        sheet: &str,
        first_cell: &str,
        rows: Vec<Vec<Value>>,
        chunk_rows: usize,
    ) -> Result<Vec<bool>> {
        parse_cell(first_cell)?;
        let chunks = ChunkDescriptor::split(rows, chunk_rows)?;

        update_chunks(self.clock.as_ref(), &self.policy, &chunks, |chunk| {
            let request = chunk.address(first_cell).and_then(|address| {
                let url = self.range_url(ctx, item_id, sheet, &address, None)?;
                Ok(ApiRequest::patch(url)
                    .json(json!({ "values": chunk.payload() }))
                    .bearer(&self.access_token))
            });
            async move { self.transport.send(request?).await }
        })
        .await
    }

    #[instrument(name = "Listing pivot tables", skip(self, ctx))]
    pub async fn list_pivot_tables(
        &self,
        ctx: &DriveContext,
        item_id: &str,
        sheet: &str,
    ) -> Result<Value> {
        let mut segments = worksheet_segments(ctx, item_id, sheet);
        segments.push("pivotTables".to_string());
        self.get_json(self.endpoint(V1, segments)?).await
    }

    /// Refresh every pivot table on `sheet`, listing the sheet's pivot tables
    /// for diagnosis if the refresh fails for good.
    #[instrument(name = "Refreshing pivot tables", skip(self, ctx))]
    pub async fn refresh_pivot_tables(
        &self,
        ctx: &DriveContext,
        item_id: &str,
        sheet: &str,
    ) -> Result<()> {
        let mut segments = worksheet_segments(ctx, item_id, sheet);
        segments.extend(["pivotTables".to_string(), "refreshAll".to_string()]);
        let request = ApiRequest::post(self.endpoint(V1, segments)?).bearer(&self.access_token);

        execute_with_diagnostics(
            self.clock.as_ref(),
            &self.policy,
            "pivot table refresh",
            || self.transport.send(request.clone()),
            || self.list_pivot_tables(ctx, item_id, sheet),
        )
        .await?;

        info!("Pivot tables refreshed");
        Ok(())
    }

    /// Refresh a single pivot table. Only available on the beta endpoint.
    #[instrument(name = "Refreshing pivot table", skip(self, ctx))]
    pub async fn refresh_pivot_table(
        &self,
        ctx: &DriveContext,
        item_id: &str,
        sheet: &str,
        pivot: &str,
    ) -> Result<()> {
        let mut segments = worksheet_segments(ctx, item_id, sheet);
        segments.extend([
            format!("pivotTables('{}')", odata_literal(pivot)),
            "refresh".to_string(),
        ]);
        self.send(ApiRequest::post(self.endpoint(BETA, segments)?)).await?;

        info!("Pivot table refreshed");
        Ok(())
    }
}

fn into_drive_item(item: GraphDriveItem) -> Result<DriveItem> {
    let name = item.name.clone();
    DriveItem::from_graph(item)
        .ok_or_else(|| AppError::Graph(format!("'{}' is neither a file nor a folder", name)))
}

fn path_segments(path: &str) -> impl Iterator<Item = String> + '_ {
    path.split('/')
        .filter(|part| !part.is_empty())
        .map(str::to_string)
}

fn join_path(folder: &str, name: &str) -> String {
    let folder = folder.trim_matches('/');
    match folder.is_empty() {
        true => name.to_string(),
        false => format!("{}/{}", folder, name),
    }
}

fn drive_segments(ctx: &DriveContext) -> Vec<String> {
    vec![
        "sites".to_string(),
        ctx.site_id.clone(),
        "drives".to_string(),
        ctx.drive_id.clone(),
    ]
}

/// Segments for `root:/{path}` or, with a tail, `root:/{path}:/{tail}`.
fn by_path(ctx: &DriveContext, path: &str, tail: Option<&str>) -> Vec<String> {
    let mut segments = drive_segments(ctx);
    let mut parts: Vec<String> = path_segments(path).collect();

    match (parts.last_mut(), tail) {
        (None, tail) => {
            segments.push("root".to_string());
            segments.extend(tail.map(str::to_string));
        }
        (Some(last), Some(tail)) => {
            last.push(':');
            segments.push("root:".to_string());
            segments.extend(parts);
            segments.push(tail.to_string());
        }
        (Some(_), None) => {
            segments.push("root:".to_string());
            segments.extend(parts);
        }
    }
    segments
}

fn item_segments<I>(ctx: &DriveContext, item_id: &str, rest: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut segments = drive_segments(ctx);
    segments.extend(["items".to_string(), item_id.to_string()]);
    segments.extend(rest.into_iter().map(|s| s.as_ref().to_string()));
    segments
}

fn worksheet_segments(ctx: &DriveContext, item_id: &str, sheet: &str) -> Vec<String> {
    item_segments(
        ctx,
        item_id,
        [
            "workbook".to_string(),
            format!("worksheets('{}')", odata_literal(sheet)),
        ],
    )
}

/// Escape a value for use inside a single-quoted OData literal.
fn odata_literal(value: &str) -> String {
    value.replace('\'', "''")
}
