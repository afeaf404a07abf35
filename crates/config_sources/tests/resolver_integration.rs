//! End to end tests wiring the resolver to real sources and loaders.

use config_resolver::{
    ConfigNode, ConfigResolver, ConfigResolverBuilder, ConfigSource, ConfigurationError, Decode,
    DecodeContext, IssueKind, ResolverOptions, Tags, Validated,
};
use config_sources::{
    default_loaders, FileSource, FileSourceFactory, JsonLoader, MapSource, MapSourceFactory,
    PropertiesLoader, StringSource, TomlLoader,
};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq)]
struct Database {
    host: String,
    port: u16,
    replicas: Vec<String>,
    timeout: Duration,
}

impl Decode for Database {
    fn decode(node: &ConfigNode, ctx: &DecodeContext<'_>) -> Validated<Self> {
        let mut agg = ctx.aggregate(node, "Database");
        let host = agg.required::<String>("host");
        let port = agg.or_default::<u16>("port");
        let replicas = agg.or_default::<Vec<String>>("replicas");
        let timeout = agg.or_else("timeout", Duration::from_secs(5));
        agg.finish(|| {
            Some(Database {
                host: host?,
                port,
                replicas,
                timeout,
            })
        })
    }
}

fn builder() -> ConfigResolverBuilder {
    ConfigResolver::builder()
        .with_loader(Arc::new(JsonLoader::new()))
        .with_loader(Arc::new(TomlLoader::new()))
        .with_loader(Arc::new(PropertiesLoader::new()))
        .with_source_factory(Arc::new(MapSourceFactory::new()))
        .with_source_factory(Arc::new(FileSourceFactory::new(Arc::new(default_loaders()))))
}

/// Verify a JSON file, a TOML overlay and in-memory overrides combine.
#[tokio::test]
async fn test_layered_sources() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("base.json");
    fs::write(
        &path,
        r#"{"db": {"host": "localhost", "port": 5432, "replicas": ["r1", "r2"]}}"#,
    )
    .expect("Failed to write file");

    let resolver = builder()
        .with_source(Arc::new(FileSource::new(&path)))
        .with_source(Arc::new(StringSource::new(
            "overlay",
            "toml",
            "[db]\nreplicas = [\"r9\"]\ntimeout = \"2s\"\n",
        )))
        .with_source(Arc::new(MapSource::new("cli", [("db.host", "db.internal")])))
        .build()
        .unwrap();
    resolver.load().await.unwrap();

    let db: Database = resolver.get("db").unwrap();
    assert_eq!(
        db,
        Database {
            host: "db.internal".to_string(),
            port: 5432,
            replicas: vec!["r9".to_string(), "r2".to_string()],
            timeout: Duration::from_secs(2),
        }
    );
}

/// Verify include directives splice in map and file sources.
#[tokio::test]
async fn test_includes() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let extra = temp_dir.path().join("extra.toml");
    fs::write(&extra, "ttl = 60\n").expect("Failed to write file");

    let resolver = builder()
        .with_source(Arc::new(MapSource::new(
            "defaults",
            [
                ("svc.$include".to_string(), "source=map,timeout=30,retries=2".to_string()),
                ("svc.retries".to_string(), "5".to_string()),
                ("cache.$include".to_string(), format!("source=file,path={}", extra.display())),
            ],
        )))
        .build()
        .unwrap();
    resolver.load().await.unwrap();

    assert_eq!(resolver.get::<u32>("svc.timeout").unwrap(), 30);
    assert_eq!(resolver.get::<u32>("svc.retries").unwrap(), 5);
    assert_eq!(resolver.get::<u32>("cache.ttl").unwrap(), 60);
    assert!(resolver.get_optional::<String>("svc.$include").unwrap().is_none());
}

/// Verify an include naming an unknown source fails the load.
#[tokio::test]
async fn test_unknown_include_source() {
    let resolver = builder()
        .with_source(Arc::new(MapSource::new(
            "defaults",
            [("svc.$include", "source=vault,path=x")],
        )))
        .build()
        .unwrap();

    let err = resolver.load().await.unwrap_err();

    match err {
        ConfigurationError::LoadFailed { issues, .. } => {
            assert!(issues.iter().any(|i| i.kind == IssueKind::NoFactoryForSource));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

/// Verify tagged sources overlay the base configuration.
#[tokio::test]
async fn test_tagged_string_source() {
    let prod = Tags::of([("env", "prod")]);
    let resolver = builder()
        .with_source(Arc::new(StringSource::new(
            "base",
            "properties",
            "db.host = localhost\ndb.port = 5432\n",
        )))
        .with_source(Arc::new(
            StringSource::new("prod", "json", r#"{"db": {"host": "prod-db"}}"#)
                .with_tags(prod.clone()),
        ))
        .build()
        .unwrap();
    resolver.load().await.unwrap();

    assert_eq!(resolver.get::<String>("db.host").unwrap(), "localhost");
    assert_eq!(resolver.get_tagged::<String>("db.host", &prod).unwrap(), "prod-db");
    assert_eq!(resolver.get::<u16>("@env=prod.db.port").unwrap(), 5432);
}

/// Verify a file change is picked up by reloading that file's source.
#[tokio::test]
async fn test_reload_file_source() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("app.toml");
    fs::write(&path, "[feature]\nenabled = false\n").expect("Failed to write file");
    let file = Arc::new(FileSource::new(&path));

    let resolver = builder()
        .with_source(Arc::new(MapSource::new("defaults", [("feature.name", "beta")])))
        .with_source(file.clone())
        .build()
        .unwrap();
    resolver.load().await.unwrap();
    assert!(!resolver.get::<bool>("feature.enabled").unwrap());

    fs::write(&path, "[feature]\nenabled = true\n").expect("Failed to write file");
    let report = resolver.reload(file.id()).await.unwrap();

    assert_eq!(report.generation, 2);
    assert!(resolver.get::<bool>("feature.enabled").unwrap());
    assert_eq!(resolver.get::<String>("feature.name").unwrap(), "beta");

    fs::write(&path, "not toml = = =").expect("Failed to write file");
    assert!(resolver.reload(file.id()).await.is_err());
    assert!(resolver.get::<bool>("feature.enabled").unwrap());
}

/// Verify options loaded from TOML drive secret masking.
#[tokio::test]
async fn test_options_from_toml() {
    let options = ResolverOptions::from_toml_str(
        r#"
strict = false

[secrets]
secret_paths = ["apikey"]
"#,
    )
    .unwrap();

    let resolver = builder()
        .with_options(options)
        .with_source(Arc::new(MapSource::new(
            "defaults",
            [("service.apikey", "abc123"), ("service.url", "https://example.com")],
        )))
        .build()
        .unwrap();
    resolver.load().await.unwrap();

    let rendered = resolver.render_masked();
    assert!(rendered.contains("https://example.com"));
    assert!(!rendered.contains("abc123"));
    assert_eq!(resolver.get::<String>("service.apikey").unwrap(), "abc123");
}
