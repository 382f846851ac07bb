//! MCP Server for library-catalog
//!
//! MCP Protocol (stdio) <-> application::CatalogService / ReportService
//!
//! 14 tools: init, shelf, select_catalog, book_add, book_remove, member_add,
//! member_remove, member_policy, checkout, return_book, search, overdue, books, member

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use rmcp::{
    handler::server::{tool::ToolCallContext, tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolRequestParams, CallToolResult, Content, Implementation, ListToolsResult,
        PaginatedRequestParams, ProtocolVersion, ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
    transport::stdio,
    ErrorData as McpError, ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::application::error::AppError;
use crate::application::report::ReportService;
use crate::application::service::{CatalogService, SearchField};
use crate::config::Config;
use crate::domain::model::book::Book;
use crate::domain::model::catalog;
use crate::domain::model::id::{Isbn, MemberId};
use crate::domain::model::member::Member;
use crate::domain::model::policy::{CheckoutPolicy, MemberKind, MemberPolicy, Policy};
use crate::infra::json_store::JsonCatalogRepository;

// =============================================================================
// Public entry point
// =============================================================================

/// MCP Serverを起動する。data_dirは複数Catalog格納ディレクトリ。
pub async fn run(config: Config) -> anyhow::Result<()> {
    let server = CatalogMcpServer::new(&config);
    let service = server.serve(stdio()).await?;
    service.waiting().await?;
    Ok(())
}

// =============================================================================
// MCP Server
// =============================================================================

#[derive(Clone)]
struct CatalogMcpServer {
    shelf_dir: PathBuf,
    selected: Arc<RwLock<Option<String>>>,
    /// 更新系ツールの load → validate → mutate → save を直列化する
    write_lock: Arc<Mutex<()>>,
    tool_router: ToolRouter<Self>,
}

impl CatalogMcpServer {
    fn new(config: &Config) -> Self {
        let default_path = config.data_dir.join(format!("{}.json", config.default_slug));
        let selected = default_path
            .exists()
            .then(|| config.default_slug.clone());
        Self {
            shelf_dir: config.data_dir.clone(),
            selected: Arc::new(RwLock::new(selected)),
            write_lock: Arc::new(Mutex::new(())),
            tool_router: Self::tool_router(),
        }
    }

    /// slug からCatalogファイルパスを返す。
    fn catalog_path(&self, slug: &str) -> PathBuf {
        self.shelf_dir.join(format!("{slug}.json"))
    }

    /// 選択中CatalogのServiceを返す。未選択ならエラー。
    fn service(&self) -> Result<CatalogService<JsonCatalogRepository>, McpError> {
        let guard = self
            .selected
            .read()
            .map_err(|_| McpError::internal_error("Lock poisoned", None))?;
        let slug = guard.as_ref().ok_or_else(|| {
            McpError::invalid_params(
                "No catalog selected. Use `shelf` to list catalogs and `select_catalog` to choose one.",
                None,
            )
        })?;
        Ok(self.service_for(slug))
    }

    /// 指定slugのServiceを返す（選択状態不要）。
    fn service_for(&self, slug: &str) -> CatalogService<JsonCatalogRepository> {
        let repo = JsonCatalogRepository::new(self.catalog_path(slug));
        CatalogService::new(repo)
    }

    fn lock_writes(&self) -> Result<MutexGuard<'_, ()>, McpError> {
        self.write_lock
            .lock()
            .map_err(|_| McpError::internal_error("Lock poisoned", None))
    }

    /// Shelf内のslug一覧をソート順で返す。
    fn list_catalog_slugs(&self) -> Result<Vec<String>, McpError> {
        if !self.shelf_dir.exists() {
            return Ok(Vec::new());
        }
        let dir = std::fs::read_dir(&self.shelf_dir)
            .map_err(|e| McpError::internal_error(format!("Failed to read shelf: {e}"), None))?;
        let mut slugs: Vec<String> = dir
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("json"))
            .filter_map(|e| {
                e.path()
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .map(String::from)
            })
            .collect();
        slugs.sort();
        Ok(slugs)
    }

    /// 番号 or slug → slug に解決する。
    fn resolve_catalog_ref(&self, catalog_ref: &str) -> Result<String, McpError> {
        if let Ok(num) = catalog_ref.parse::<usize>() {
            let slugs = self.list_catalog_slugs()?;
            if num == 0 || num > slugs.len() {
                return Err(McpError::invalid_params(
                    format!(
                        "Catalog number {} out of range (1-{}). Use `shelf` to see available catalogs.",
                        num,
                        slugs.len()
                    ),
                    None,
                ));
            }
            return Ok(slugs[num - 1].clone());
        }
        validate_slug(catalog_ref)?;
        Ok(catalog_ref.to_string())
    }

    /// ドメインエラーと未初期化は呼び出し側の誤り、保存失敗はサーバ側の誤り。
    fn to_mcp_error(e: AppError) -> McpError {
        match e {
            AppError::Domain(_) | AppError::CatalogNotFound => {
                McpError::invalid_params(format!("{e}"), None)
            }
            AppError::Storage(_) => McpError::internal_error(format!("{e}"), None),
        }
    }
}

// =============================================================================
// ServerHandler impl
// =============================================================================

impl ServerHandler for CatalogMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "library-catalog".to_string(),
                title: Some("Library Catalog".to_string()),
                description: Some(
                    "Books, members and checkouts with per-member-type policies. \
                     Catalogs are stored as JSON documents."
                        .to_string(),
                ),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Manage a library catalog.\n\
                 \n\
                 Tools: `shelf` → `select_catalog` → `books`/`search`/`member`, \
                 `checkout`/`return_book`, `overdue`. \
                 `book_add`/`member_add` to register, `member_policy` to upgrade or downgrade. \
                 `init` for a new catalog."
                    .to_string(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            tools: self.tool_router.list_all(),
            next_cursor: None,
            meta: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let tool_ctx = ToolCallContext::new(self, request, context);
        self.tool_router.call(tool_ctx).await
    }
}

// =============================================================================
// Request types
// =============================================================================

/// slugが安全なファイル名であることを検証する。
fn validate_slug(slug: &str) -> Result<(), McpError> {
    if slug.is_empty() {
        return Err(McpError::invalid_params("slug must not be empty", None));
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(McpError::invalid_params(
            "slug must contain only alphanumeric characters, hyphens, and underscores",
            None,
        ));
    }
    Ok(())
}

fn parse_isbn(s: &str) -> Result<Isbn, McpError> {
    Isbn::parse(s).map_err(|e| McpError::invalid_params(format!("{e}"), None))
}

fn parse_member_id(s: &str) -> Result<MemberId, McpError> {
    MemberId::parse(s).map_err(|e| McpError::invalid_params(format!("{e}"), None))
}

fn parse_search_field(s: &str) -> Result<SearchField, McpError> {
    match s {
        "title" => Ok(SearchField::Title),
        "author" => Ok(SearchField::Author),
        "genre" => Ok(SearchField::Genre),
        other => Err(McpError::invalid_params(
            format!("Unknown field: '{other}'. Use: title, author, genre"),
            None,
        )),
    }
}

fn parse_member_kind(s: &str) -> Result<MemberKind, McpError> {
    match s {
        "member" => Ok(MemberKind::Member),
        "student" => Ok(MemberKind::Student),
        "faculty" => Ok(MemberKind::Faculty),
        "regular" => Ok(MemberKind::RegularMember),
        other => Err(McpError::invalid_params(
            format!("Unknown kind: '{other}'. Use: member, student, faculty, regular"),
            None,
        )),
    }
}

/// リクエストからポリシーを組み立てる。
///
/// limit/days を両方指定すると独自ポリシー（attached）になる。
fn build_policy(
    kind: &str,
    attached: bool,
    type_name: Option<String>,
    checkout_limit: Option<usize>,
    checkout_days: Option<u32>,
) -> Result<Policy, McpError> {
    let kind = parse_member_kind(kind)?;
    match (checkout_limit, checkout_days) {
        (Some(_), Some(days)) if days > MemberPolicy::MAX_CHECKOUT_DAYS => {
            Err(McpError::invalid_params(
                format!(
                    "checkout_days must be at most {}",
                    MemberPolicy::MAX_CHECKOUT_DAYS
                ),
                None,
            ))
        }
        (Some(limit), Some(days)) => {
            let name = type_name.unwrap_or_else(|| kind.type_name().to_string());
            Ok(Policy::Attached(MemberPolicy::new(name, limit, days)))
        }
        (None, None) if attached => Ok(Policy::Attached(MemberPolicy::from_kind(kind))),
        (None, None) => Ok(Policy::Fixed(kind)),
        _ => Err(McpError::invalid_params(
            "checkout_limit and checkout_days must be given together",
            None,
        )),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct McpInitRequest {
    #[schemars(description = "Library name")]
    pub name: String,
    #[schemars(
        description = "Catalog slug for filename (e.g. 'city', 'campus'). Alphanumeric, hyphens, underscores only."
    )]
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct McpShelfRequest {}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct McpSelectCatalogRequest {
    #[schemars(
        description = "Catalog to select: number from `shelf` output (e.g. '1') or catalog slug (e.g. 'city')"
    )]
    pub catalog: String,

    #[schemars(description = "Suppress book listing (default: false)")]
    #[serde(default)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct McpBookAddRequest {
    #[schemars(description = "Book title")]
    pub title: String,
    #[schemars(description = "Author name")]
    pub author: String,
    #[schemars(description = "ISBN, unique within the catalog (digits, letters, hyphens)")]
    pub isbn: String,
    #[schemars(description = "Genre (e.g. 'Fiction', 'Science')")]
    pub genre: String,
    #[schemars(description = "Publication year")]
    pub publication_year: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct McpIsbnRequest {
    #[schemars(description = "ISBN of the book")]
    pub isbn: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct McpMemberAddRequest {
    #[schemars(description = "Member name")]
    pub name: String,
    #[schemars(description = "Numeric member ID, unique within the catalog")]
    pub member_id: String,
    #[schemars(description = "Member kind: member, student, faculty, regular (default: member)")]
    pub kind: Option<String>,
    #[schemars(
        description = "Attach the policy as a swappable object instead of fixing it to the kind (default: false)"
    )]
    #[serde(default)]
    pub attached: bool,
    #[schemars(description = "Custom policy name (only with checkout_limit and checkout_days)")]
    pub type_name: Option<String>,
    #[schemars(description = "Custom maximum number of books held at once")]
    pub checkout_limit: Option<usize>,
    #[schemars(description = "Custom loan duration in days")]
    pub checkout_days: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct McpMemberRequest {
    #[schemars(description = "Numeric member ID")]
    pub member_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct McpMemberPolicyRequest {
    #[schemars(description = "Numeric member ID")]
    pub member_id: String,
    #[schemars(
        description = "Action: 'upgrade' (to faculty), 'downgrade' (to student), or 'set' (use kind / custom fields)"
    )]
    pub action: String,
    #[schemars(description = "Member kind for 'set': member, student, faculty, regular")]
    pub kind: Option<String>,
    #[schemars(description = "Attach the new policy as an object (for 'set', default: false)")]
    #[serde(default)]
    pub attached: bool,
    #[schemars(description = "Custom policy name (for 'set')")]
    pub type_name: Option<String>,
    #[schemars(description = "Custom checkout limit (for 'set')")]
    pub checkout_limit: Option<usize>,
    #[schemars(description = "Custom loan duration in days (for 'set')")]
    pub checkout_days: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct McpLoanRequest {
    #[schemars(description = "ISBN of the book")]
    pub isbn: String,
    #[schemars(description = "Numeric member ID")]
    pub member_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct McpSearchRequest {
    #[schemars(description = "Field to search: title, author, genre")]
    pub field: String,
    #[schemars(description = "Case-insensitive substring to look for")]
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct McpListRequest {}

// =============================================================================
// Tool implementations
// =============================================================================

#[tool_router]
impl CatalogMcpServer {
    #[tool(
        name = "init",
        description = "Create a new catalog in the shelf. Requires a slug (filename) and library name. Auto-selects the new catalog.",
        annotations(
            read_only_hint = false,
            destructive_hint = false,
            idempotent_hint = false,
            open_world_hint = false
        )
    )]
    async fn init(
        &self,
        Parameters(req): Parameters<McpInitRequest>,
    ) -> Result<CallToolResult, McpError> {
        validate_slug(&req.slug)?;
        let _write = self.lock_writes()?;
        let path = self.catalog_path(&req.slug);
        if path.exists() {
            return Err(McpError::invalid_params(
                format!(
                    "Catalog '{}' already exists. Choose a different slug.",
                    req.slug
                ),
                None,
            ));
        }

        std::fs::create_dir_all(&self.shelf_dir).map_err(|e| {
            McpError::internal_error(format!("Failed to create shelf directory: {e}"), None)
        })?;

        let svc = self.service_for(&req.slug);
        let catalog = svc
            .create_catalog(&req.name)
            .map_err(Self::to_mcp_error)?;

        let mut guard = self
            .selected
            .write()
            .map_err(|_| McpError::internal_error("Lock poisoned", None))?;
        *guard = Some(req.slug.clone());

        Ok(CallToolResult::success(vec![Content::text(format!(
            "Created catalog: '{}' (slug: {}). Auto-selected.",
            catalog.name(),
            req.slug
        ))]))
    }

    #[tool(
        name = "shelf",
        description = "List all catalogs in the shelf with book and member counts. The selected catalog is marked with ★.",
        annotations(
            read_only_hint = true,
            destructive_hint = false,
            open_world_hint = false
        )
    )]
    async fn shelf(
        &self,
        #[allow(unused_variables)] Parameters(_req): Parameters<McpShelfRequest>,
    ) -> Result<CallToolResult, McpError> {
        let slugs = self.list_catalog_slugs()?;
        if slugs.is_empty() {
            return Ok(CallToolResult::success(vec![Content::text(
                "Shelf is empty. Use `init` to create a new catalog.",
            )]));
        }

        let selected = self
            .selected
            .read()
            .map_err(|_| McpError::internal_error("Lock poisoned", None))?;

        let mut output = format!("# Shelf ({} catalogs)\n\n", slugs.len());
        for (i, slug) in slugs.iter().enumerate() {
            let summary = match self.service_for(slug).read_catalog() {
                Ok(catalog) => format!(
                    "\"{}\" ({} books, {} members)",
                    catalog.name(),
                    catalog.book_count(),
                    catalog.member_count()
                ),
                Err(e) => {
                    tracing::warn!(%slug, error = %e, "failed to load catalog");
                    "(failed to load)".to_string()
                }
            };
            let marker = if selected.as_deref() == Some(slug.as_str()) {
                " ★"
            } else {
                ""
            };
            output.push_str(&format!("{}. {}: {}{}\n", i + 1, slug, summary, marker));
        }

        Ok(CallToolResult::success(vec![Content::text(output)]))
    }

    #[tool(
        name = "select_catalog",
        description = "Select a catalog to work with. Use a number from `shelf` output or a catalog slug. Shows the book list unless quiet=true.",
        annotations(
            read_only_hint = false,
            destructive_hint = false,
            idempotent_hint = true,
            open_world_hint = false
        )
    )]
    async fn select_catalog(
        &self,
        Parameters(req): Parameters<McpSelectCatalogRequest>,
    ) -> Result<CallToolResult, McpError> {
        let slug = self.resolve_catalog_ref(&req.catalog)?;
        if !self.catalog_path(&slug).exists() {
            return Err(McpError::invalid_params(
                format!(
                    "Catalog '{}' not found in shelf. Use `shelf` to list available catalogs.",
                    slug
                ),
                None,
            ));
        }

        let catalog = self
            .service_for(&slug)
            .read_catalog()
            .map_err(Self::to_mcp_error)?;

        let mut guard = self
            .selected
            .write()
            .map_err(|_| McpError::internal_error("Lock poisoned", None))?;
        *guard = Some(slug.clone());

        let listing = if req.quiet {
            String::new()
        } else {
            format!("\n\n{}", ReportService::render_books(&catalog))
        };

        Ok(CallToolResult::success(vec![Content::text(format!(
            "Selected: {} (\"{}\", {} books, {} members){}",
            slug,
            catalog.name(),
            catalog.book_count(),
            catalog.member_count(),
            listing
        ))]))
    }

    #[tool(
        name = "book_add",
        description = "Add a book to the selected catalog. ISBN must be unique.",
        annotations(
            read_only_hint = false,
            destructive_hint = false,
            idempotent_hint = false,
            open_world_hint = false
        )
    )]
    async fn book_add(
        &self,
        Parameters(req): Parameters<McpBookAddRequest>,
    ) -> Result<CallToolResult, McpError> {
        let svc = self.service()?;
        let isbn = parse_isbn(&req.isbn)?;
        let book = Book::new(req.title, req.author, isbn, req.genre, req.publication_year);
        let summary = book.to_string();

        let _write = self.lock_writes()?;
        svc.add_book(book).map_err(Self::to_mcp_error)?;

        Ok(CallToolResult::success(vec![Content::text(format!(
            "Added: {summary}"
        ))]))
    }

    #[tool(
        name = "book_remove",
        description = "Remove a book by ISBN. A member currently holding it keeps the ISBN in their list.",
        annotations(
            read_only_hint = false,
            destructive_hint = true,
            idempotent_hint = false,
            open_world_hint = false
        )
    )]
    async fn book_remove(
        &self,
        Parameters(req): Parameters<McpIsbnRequest>,
    ) -> Result<CallToolResult, McpError> {
        let svc = self.service()?;
        let isbn = parse_isbn(&req.isbn)?;

        let _write = self.lock_writes()?;
        let book = svc.remove_book(&isbn).map_err(Self::to_mcp_error)?;

        Ok(CallToolResult::success(vec![Content::text(format!(
            "Removed: {book}"
        ))]))
    }

    #[tool(
        name = "member_add",
        description = "Register a member. Kind selects the checkout policy (student 2 books/14 days, faculty 5/30, regular 3/14, member 3/14). Give checkout_limit and checkout_days for a custom policy.",
        annotations(
            read_only_hint = false,
            destructive_hint = false,
            idempotent_hint = false,
            open_world_hint = false
        )
    )]
    async fn member_add(
        &self,
        Parameters(req): Parameters<McpMemberAddRequest>,
    ) -> Result<CallToolResult, McpError> {
        let svc = self.service()?;
        let id = parse_member_id(&req.member_id)?;
        let policy = build_policy(
            req.kind.as_deref().unwrap_or("member"),
            req.attached,
            req.type_name,
            req.checkout_limit,
            req.checkout_days,
        )?;
        let member = Member::new(req.name, id, policy);
        let summary = member.to_string();

        let _write = self.lock_writes()?;
        svc.add_member(member).map_err(Self::to_mcp_error)?;

        Ok(CallToolResult::success(vec![Content::text(format!(
            "Added: {summary}"
        ))]))
    }

    #[tool(
        name = "member_remove",
        description = "Remove a member by ID. Books they hold stay checked out.",
        annotations(
            read_only_hint = false,
            destructive_hint = true,
            idempotent_hint = false,
            open_world_hint = false
        )
    )]
    async fn member_remove(
        &self,
        Parameters(req): Parameters<McpMemberRequest>,
    ) -> Result<CallToolResult, McpError> {
        let svc = self.service()?;
        let id = parse_member_id(&req.member_id)?;

        let _write = self.lock_writes()?;
        let member = svc.remove_member(id).map_err(Self::to_mcp_error)?;

        Ok(CallToolResult::success(vec![Content::text(format!(
            "Removed: {member}"
        ))]))
    }

    #[tool(
        name = "member_policy",
        description = "Change a member's checkout policy without losing holdings or history. 'upgrade' to faculty, 'downgrade' to student, or 'set' a kind / custom policy.",
        annotations(
            read_only_hint = false,
            destructive_hint = false,
            idempotent_hint = true,
            open_world_hint = false
        )
    )]
    async fn member_policy(
        &self,
        Parameters(req): Parameters<McpMemberPolicyRequest>,
    ) -> Result<CallToolResult, McpError> {
        let svc = self.service()?;
        let id = parse_member_id(&req.member_id)?;

        let _write = self.lock_writes()?;
        let current = svc.find_member(id).map_err(Self::to_mcp_error)?;
        let policy = match req.action.as_str() {
            "upgrade" => current.policy().switched_to(MemberKind::Faculty),
            "downgrade" => current.policy().switched_to(MemberKind::Student),
            "set" => build_policy(
                req.kind.as_deref().unwrap_or("member"),
                req.attached,
                req.type_name,
                req.checkout_limit,
                req.checkout_days,
            )?,
            other => {
                return Err(McpError::invalid_params(
                    format!("Unknown action: '{other}'. Use: upgrade, downgrade, set"),
                    None,
                ))
            }
        };
        let member = svc.change_policy(id, policy).map_err(Self::to_mcp_error)?;

        let note = if member.checked_books().len() > member.checkout_limit() {
            format!(
                "\nNote: currently holds {} books, above the new limit.",
                member.checked_books().len()
            )
        } else {
            String::new()
        };
        Ok(CallToolResult::success(vec![Content::text(format!(
            "Updated: {member}{note}"
        ))]))
    }

    #[tool(
        name = "checkout",
        description = "Check out a book to a member. Fails if the book or member is unknown, the book is already out, or the member is at their limit.",
        annotations(
            read_only_hint = false,
            destructive_hint = false,
            idempotent_hint = false,
            open_world_hint = false
        )
    )]
    async fn checkout(
        &self,
        Parameters(req): Parameters<McpLoanRequest>,
    ) -> Result<CallToolResult, McpError> {
        let svc = self.service()?;
        let isbn = parse_isbn(&req.isbn)?;
        let id = parse_member_id(&req.member_id)?;

        let _write = self.lock_writes()?;
        let receipt = svc.check_out(&isbn, id).map_err(Self::to_mcp_error)?;

        Ok(CallToolResult::success(vec![Content::text(
            receipt.to_string(),
        )]))
    }

    #[tool(
        name = "return_book",
        description = "Return a book held by a member. Fails if the book is not checked out or is held by someone else.",
        annotations(
            read_only_hint = false,
            destructive_hint = false,
            idempotent_hint = false,
            open_world_hint = false
        )
    )]
    async fn return_book(
        &self,
        Parameters(req): Parameters<McpLoanRequest>,
    ) -> Result<CallToolResult, McpError> {
        let svc = self.service()?;
        let isbn = parse_isbn(&req.isbn)?;
        let id = parse_member_id(&req.member_id)?;

        let _write = self.lock_writes()?;
        let receipt = svc.return_book(&isbn, id).map_err(Self::to_mcp_error)?;

        let mut text = receipt.to_string();
        if !receipt.history_closed {
            text.push_str("\nNote: no open checkout record was found; history left unchanged.");
        }
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    #[tool(
        name = "search",
        description = "Search books by title, author, or genre (case-insensitive substring).",
        annotations(
            read_only_hint = true,
            destructive_hint = false,
            open_world_hint = false
        )
    )]
    async fn search(
        &self,
        Parameters(req): Parameters<McpSearchRequest>,
    ) -> Result<CallToolResult, McpError> {
        let svc = self.service()?;
        let field = parse_search_field(&req.field)?;
        let books = svc.search(field, &req.query).map_err(Self::to_mcp_error)?;

        Ok(CallToolResult::success(vec![Content::text(
            ReportService::render_search(field, &req.query, &books),
        )]))
    }

    #[tool(
        name = "overdue",
        description = "List checked-out books whose due date has passed.",
        annotations(
            read_only_hint = true,
            destructive_hint = false,
            open_world_hint = false
        )
    )]
    async fn overdue(
        &self,
        #[allow(unused_variables)] Parameters(_req): Parameters<McpListRequest>,
    ) -> Result<CallToolResult, McpError> {
        let svc = self.service()?;
        let today = catalog::today();
        let books = svc.overdue_books(today).map_err(Self::to_mcp_error)?;
        let catalog = svc.read_catalog().map_err(Self::to_mcp_error)?;

        Ok(CallToolResult::success(vec![Content::text(
            ReportService::render_overdue(&catalog, &books, today),
        )]))
    }

    #[tool(
        name = "books",
        description = "Show all books in the selected catalog with their status and holder.",
        annotations(
            read_only_hint = true,
            destructive_hint = false,
            open_world_hint = false
        )
    )]
    async fn books(
        &self,
        #[allow(unused_variables)] Parameters(_req): Parameters<McpListRequest>,
    ) -> Result<CallToolResult, McpError> {
        let svc = self.service()?;
        let catalog = svc.read_catalog().map_err(Self::to_mcp_error)?;

        Ok(CallToolResult::success(vec![Content::text(
            ReportService::render_books(&catalog),
        )]))
    }

    #[tool(
        name = "member",
        description = "Show a member's policy, current holdings, and full checkout history.",
        annotations(
            read_only_hint = true,
            destructive_hint = false,
            open_world_hint = false
        )
    )]
    async fn member(
        &self,
        Parameters(req): Parameters<McpMemberRequest>,
    ) -> Result<CallToolResult, McpError> {
        let svc = self.service()?;
        let id = parse_member_id(&req.member_id)?;
        let catalog = svc.read_catalog().map_err(Self::to_mcp_error)?;
        let member = catalog
            .find_member(id)
            .map_err(|e| Self::to_mcp_error(e.into()))?;

        Ok(CallToolResult::success(vec![Content::text(
            ReportService::render_member(&catalog, member),
        )]))
    }
}

// =============================================================================
// Tests
// =============================================================================
