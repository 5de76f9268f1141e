use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use crash_query::projection::FacetRequest;
use crash_query::query::{Operator, RawRule};
use crash_query::schema::{FieldSchema, SchemaRegistry, SchemaSource};
use crash_query::search::{ElasticsearchBackend, SearchConfig, SearchPlanner, SearchRequest};
use reqwest::Client;
use serde_json::{json, Value};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "crash-query-cli")]
#[command(about = "Crash report search CLI", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct QueryArgs {
    /// Filter rule as FIELD:OPERATOR[:VALUE]; prefix the operator with `!`
    /// to negate, separate `in` values with commas
    #[arg(short, long = "rule", value_name = "RULE")]
    rules: Vec<String>,

    /// Facet as FIELD or FIELD=SIZE
    #[arg(short, long = "facet", value_name = "FACET")]
    facets: Vec<String>,

    /// Result column
    #[arg(short, long = "column", value_name = "FIELD")]
    columns: Vec<String>,

    #[arg(short, long)]
    limit: Option<usize>,

    #[arg(short, long, default_value = "0")]
    offset: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a search against the server
    Search(QueryArgs),

    /// Compile a search locally and print the backend request body
    Compile {
        #[command(flatten)]
        query: QueryArgs,

        /// Mapping file; defaults to the bundled crash-report schema
        #[arg(short, long)]
        schema: Option<PathBuf>,
    },

    /// List fields, or show one field
    Fields {
        #[arg(value_name = "FIELD")]
        name: Option<String>,

        /// Only fields usable as facets
        #[arg(long)]
        facetable: bool,
    },

    /// Ask the server to reload its schema
    RefreshSchema,

    /// Check server health
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = Client::new();

    match cli.command {
        Commands::Search(query) => {
            let request = build_request(&query)?;
            let response = client
                .post(format!("{}/v1/search", cli.endpoint))
                .json(&request)
                .send()
                .await?;

            let body: Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }

        Commands::Compile { query, schema } => {
            let source = match schema {
                Some(path) => SchemaSource::File(path),
                None => SchemaSource::Bundled,
            };
            let registry = SchemaRegistry::load(source).context("failed to load schema")?;
            let request = build_request(&query)?;
            let body = compile(&registry.snapshot(), &request);
            println!("{}", serde_json::to_string_pretty(&body)?);
        }

        Commands::Fields { name, facetable } => {
            let url = match name {
                Some(name) => format!("{}/v1/fields/{}", cli.endpoint, name),
                None => format!("{}/v1/fields?facetable={}", cli.endpoint, facetable),
            };
            let response = client.get(url).send().await?;

            let body: Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }

        Commands::RefreshSchema => {
            let response = client
                .post(format!("{}/v1/schema/refresh", cli.endpoint))
                .send()
                .await?;

            let body: Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }

        Commands::Health => {
            let response = client
                .get(format!("{}/health", cli.endpoint))
                .send()
                .await?;

            let body: Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }

    Ok(())
}

fn build_request(args: &QueryArgs) -> Result<SearchRequest> {
    let mut request = SearchRequest::new()
        .with_columns(args.columns.iter().cloned())
        .with_offset(args.offset);
    if let Some(limit) = args.limit {
        request = request.with_limit(limit);
    }
    for rule in &args.rules {
        request = request.with_rule(parse_rule(rule)?);
    }
    for facet in &args.facets {
        request = request.with_facet(parse_facet(facet)?);
    }
    Ok(request)
}

/// Plan a request offline; validation errors are printed as JSON details
fn compile(schema: &FieldSchema, request: &SearchRequest) -> Value {
    let planner = SearchPlanner::new(SearchConfig::default());
    match planner.plan(schema, request, Utc::now()) {
        Ok(plan) => json!({
            "schema_version": plan.schema_version,
            "date_range": plan.date_range,
            "body": ElasticsearchBackend::request_body(&plan.request),
        }),
        Err(e) => {
            let details: Vec<_> = e.query_errors().iter().map(|q| q.detail()).collect();
            json!({ "error": e.to_string(), "details": details })
        }
    }
}

/// `FIELD:OPERATOR[:VALUE]`, with `!OPERATOR` for negation
fn parse_rule(spec: &str) -> Result<RawRule> {
    let mut parts = spec.splitn(3, ':');
    let field = parts.next().filter(|f| !f.is_empty());
    let operator = parts.next().filter(|o| !o.is_empty());
    let (Some(field), Some(operator)) = (field, operator) else {
        bail!("rule '{}' must look like FIELD:OPERATOR[:VALUE]", spec);
    };

    let (negate, operator) = match operator.strip_prefix('!') {
        Some(op) => (true, op),
        None => (false, operator),
    };

    let value = match (operator.parse::<Operator>(), parts.next()) {
        (_, None) => Value::Null,
        (Ok(Operator::In), Some(list)) => {
            Value::Array(list.split(',').map(|v| Value::from(v.trim())).collect())
        }
        (_, Some(v)) => Value::from(v),
    };

    let rule = RawRule::new(field, operator, value);
    Ok(if negate { rule.negated() } else { rule })
}

/// `FIELD` or `FIELD=SIZE`
fn parse_facet(spec: &str) -> Result<FacetRequest> {
    match spec.split_once('=') {
        None => Ok(FacetRequest::new(spec)),
        Some((field, size)) => size
            .parse::<usize>()
            .map(|size| FacetRequest::new(field).with_size(size))
            .with_context(|| format!("facet '{}' has an invalid size", spec)),
    }
}
