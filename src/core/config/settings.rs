use super::parsing::{
    env_finite, env_number, env_optional, env_or_default, is_supported_document_extension,
    parse_bool, parse_cors_origins, parse_environment, parse_string_list,
};
use super::types::{
    AiSettings, ApiSettings, ConfigError, CorsSettings, DatabaseSettings, GamificationSettings,
    IngestionSettings, RedisSettings, RuntimeSettings, S3Settings, SecuritySettings, ServerHost,
    ServerPort, ServerSettings, Settings, TelemetrySettings,
};

/// Upper bound for the job timeout and the sweep interval: one day.
const MAX_INGESTION_SECONDS: u64 = 86_400;

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("LESSONFORGE_HOST", "0.0.0.0");
        let port = env_or_default("LESSONFORGE_PORT", "8000");

        let environment = parse_environment(
            env_optional("LESSONFORGE_ENV").or_else(|| env_optional("ENVIRONMENT")),
        );
        let strict_config = env_optional("LESSONFORGE_STRICT_CONFIG")
            .map(|value| parse_bool(&value))
            .unwrap_or(false)
            || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "LessonForge");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");

        // Tokens are minted by the account service, so the key is always shared.
        let secret_key =
            env_optional("SECRET_KEY").ok_or(ConfigError::MissingSecret("SECRET_KEY"))?;
        let access_token_expire_minutes = env_number("ACCESS_TOKEN_EXPIRE_MINUTES", "10080")?;
        let algorithm = env_or_default("ALGORITHM", "HS256");

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = env_number("POSTGRES_PORT", "5432")?;
        let postgres_user = env_or_default("POSTGRES_USER", "lessonforge");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "lessonforge");
        let database_url = env_optional("DATABASE_URL");
        let max_connections = env_number("DATABASE_MAX_CONNECTIONS", "20")?;

        let redis_host = env_or_default("REDIS_HOST", "localhost");
        let redis_port = env_number("REDIS_PORT", "6379")?;
        let redis_db = env_number("REDIS_DB", "0")?;
        let redis_password = env_or_default("REDIS_PASSWORD", "");

        let openai_api_key = env_or_default("OPENAI_API_KEY", "");
        let openai_base_url = env_or_default("OPENAI_BASE_URL", "https://api.openai.com/v1");
        let ai_model = env_or_default("AI_MODEL", "gpt-4o-mini");
        let ai_max_tokens = env_number("AI_MAX_TOKENS", "4000")?;
        let ai_request_timeout = env_number("AI_REQUEST_TIMEOUT", "120")?;
        let ai_temperature = env_finite("AI_TEMPERATURE", "0.4")?;
        let ai_max_retries = env_number("AI_MAX_RETRIES", "2")?;

        let job_timeout_seconds = env_number("INGESTION_JOB_TIMEOUT_SECONDS", "900")?;
        let sweep_interval_seconds = env_number("INGESTION_SWEEP_INTERVAL_SECONDS", "300")?;
        let max_document_size_mb = env_number("MAX_DOCUMENT_SIZE_MB", "10")?;
        let allowed_document_extensions =
            parse_string_list(env_optional("ALLOWED_DOCUMENT_EXTENSIONS"), &["txt", "md"]);
        let local_document_dir = env_or_default("LOCAL_DOCUMENT_DIR", "uploads/chapters");
        let presigned_url_expire_minutes = env_number("PRESIGNED_URL_EXPIRE_MINUTES", "10")?;
        let submissions_per_hour = env_number("CHAPTER_SUBMISSIONS_PER_HOUR", "20")?;

        let s3_endpoint = env_or_default("S3_ENDPOINT", "http://localhost:9000");
        let s3_access_key = env_or_default("S3_ACCESS_KEY", "");
        let s3_secret_key = env_or_default("S3_SECRET_KEY", "");
        let s3_bucket = env_or_default("S3_BUCKET", "lessonforge-documents");
        let s3_region = env_or_default("S3_REGION", "us-east-1");

        let spins_per_day = env_number("SPINS_PER_DAY", "1")?;
        let leaderboard_size = env_number::<i64>("LEADERBOARD_SIZE", "10")?;

        let log_level = env_or_default("LESSONFORGE_LOG_LEVEL", "info");
        let json =
            env_optional("LESSONFORGE_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version, api_v1_str },
            security: SecuritySettings { secret_key, access_token_expire_minutes, algorithm },
            cors: CorsSettings { origins: cors_origins },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
                max_connections,
            },
            redis: RedisSettings {
                host: redis_host,
                port: redis_port,
                db: redis_db,
                password: redis_password,
            },
            ai: AiSettings {
                openai_api_key,
                openai_base_url,
                ai_model,
                ai_max_tokens,
                ai_request_timeout,
                ai_temperature,
                ai_max_retries,
            },
            ingestion: IngestionSettings {
                job_timeout_seconds,
                sweep_interval_seconds,
                max_document_size_mb,
                allowed_document_extensions,
                local_document_dir,
                presigned_url_expire_minutes,
                submissions_per_hour,
            },
            s3: S3Settings {
                endpoint: s3_endpoint,
                access_key: s3_access_key,
                secret_key: s3_secret_key,
                bucket: s3_bucket,
                region: s3_region,
            },
            gamification: GamificationSettings { spins_per_day, leaderboard_size },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn security(&self) -> &SecuritySettings {
        &self.security
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn redis(&self) -> &RedisSettings {
        &self.redis
    }

    pub(crate) fn ai(&self) -> &AiSettings {
        &self.ai
    }

    pub(crate) fn ingestion(&self) -> &IngestionSettings {
        &self.ingestion
    }

    pub(crate) fn s3(&self) -> &S3Settings {
        &self.s3
    }

    pub(crate) fn gamification(&self) -> &GamificationSettings {
        &self.gamification
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.ingestion.allowed_document_extensions.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "ALLOWED_DOCUMENT_EXTENSIONS",
                value: String::from("<empty>"),
            });
        }

        for extension in &self.ingestion.allowed_document_extensions {
            if !is_supported_document_extension(extension) {
                return Err(ConfigError::InvalidValue {
                    field: "ALLOWED_DOCUMENT_EXTENSIONS",
                    value: extension.clone(),
                });
            }
        }

        if !(1..=MAX_INGESTION_SECONDS).contains(&self.ingestion.job_timeout_seconds) {
            return Err(ConfigError::InvalidValue {
                field: "INGESTION_JOB_TIMEOUT_SECONDS",
                value: self.ingestion.job_timeout_seconds.to_string(),
            });
        }

        if !(1..=MAX_INGESTION_SECONDS).contains(&self.ingestion.sweep_interval_seconds) {
            return Err(ConfigError::InvalidValue {
                field: "INGESTION_SWEEP_INTERVAL_SECONDS",
                value: self.ingestion.sweep_interval_seconds.to_string(),
            });
        }

        if !(1..=100).contains(&self.gamification.leaderboard_size) {
            return Err(ConfigError::InvalidValue {
                field: "LEADERBOARD_SIZE",
                value: self.gamification.leaderboard_size.to_string(),
            });
        }

        if !(0.0..=2.0).contains(&self.ai.ai_temperature) {
            return Err(ConfigError::InvalidValue {
                field: "AI_TEMPERATURE",
                value: self.ai.ai_temperature.to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }
        if self.ai.openai_api_key.is_empty() {
            return Err(ConfigError::MissingSecret("OPENAI_API_KEY"));
        }
        if self.ai.openai_base_url.is_empty() {
            return Err(ConfigError::MissingSecret("OPENAI_BASE_URL"));
        }

        Ok(())
    }
}
