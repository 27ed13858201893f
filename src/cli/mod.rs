//! CLI 모듈
//!
//! palank-eval CLI 명령어 정의 및 구현

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::config::{get_data_dir, Pacing, Settings};
use crate::dataset::{self, GoldenDataset};
use crate::embedding::{create_embedder, EmbedderKind, EmbeddingProvider};
use crate::eval::{
    save_records, write_pretty_json, EvalRecord, FaithfulnessMetric, GEval, LlmTestCase, Metric,
    ToxicityMetric,
};
use crate::experiment::{
    self, print_report, run_prompt_experiment, ChunkingExperiment, ChunkingRun, PromptRun,
    QualityReport, RagasEvaluation, DEFAULT_CHUNK_SIZES, EXPERIMENT_OVERLAP,
};
use crate::iso::{save_scenarios, GeneratedScenario, IsoGenerator};
use crate::knowledge::{load_documents, LanceVectorStore, VectorStore};
use crate::llm::{
    create_model, gemini_model, is_model_installed, ollama_model, KeyPool, LanguageModel,
    ModelProvider,
};
use crate::rag::{GuardrailLevel, RagConfig, RagPipeline};
use crate::redteam::{
    AdversarialCategory, AdversarialSuite, AttackFile, RedTeamBench, SafetyEvaluation,
};

/// 봇(대상 모델)이 쓰는 시작 키 인덱스
const BOT_KEY_START: usize = 0;
/// judge가 쓰는 시작 키 인덱스 (봇과 다른 계정)
const JUDGE_KEY_START: usize = 1;

/// `rag debug` 청크 미리보기 길이
const DEBUG_PREVIEW_CHARS: usize = 100;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "palank-eval")]
#[command(version, about = "LLM 레드팀 · RAG 품질 평가 도구", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// 모든 명령어 공통 옵션
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// 설정 파일 경로 (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// rate limit 대기 생략
    #[arg(long, global = true)]
    pub no_wait: bool,

    /// judge 모델 프로바이더
    #[arg(long, global = true, value_enum, default_value = "gemini")]
    pub judge: ModelProvider,

    /// RAG 답변 생성 모델 프로바이더
    #[arg(long, global = true, value_enum, default_value = "ollama")]
    pub llm: ModelProvider,

    /// 임베딩 프로바이더
    #[arg(long, global = true, value_enum, default_value = "ollama")]
    pub embedder: EmbedderKind,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 설정, API 키, Ollama 모델, 컬렉션 상태 확인
    Status,

    /// Gemini 단일 호출 (키 로테이션)
    Generate {
        /// 프롬프트
        #[arg(short, long)]
        prompt: String,
    },

    /// ISO 20022 pain.001 테스트 시나리오 생성
    Iso {
        #[command(subcommand)]
        command: IsoCommand,
    },

    /// 레드팀 평가
    Redteam {
        #[command(subcommand)]
        command: RedteamCommand,
    },

    /// judge 메트릭 단독 실행
    Judge {
        #[command(subcommand)]
        command: JudgeCommand,
    },

    /// RAG 질의
    Rag {
        #[command(subcommand)]
        command: RagCommand,
    },

    /// RAG 설정 실험
    Experiment {
        #[command(subcommand)]
        command: ExperimentCommand,
    },
}

#[derive(Subcommand)]
pub enum IsoCommand {
    /// 시나리오마다 개별 요청 (요청 사이 쿨다운)
    Single {
        /// 시나리오 (여러 번 지정 가능)
        #[arg(long = "scenario")]
        scenarios: Vec<String>,

        /// XML 저장 디렉토리
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// 한 번의 요청으로 여러 시나리오 생성
    Batch {
        /// 시나리오 (여러 번 지정 가능)
        #[arg(long = "scenario")]
        scenarios: Vec<String>,

        /// XML 저장 디렉토리
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum RedteamCommand {
    /// 공격 파일 기반 라이브 벤치마크
    Bench {
        /// 공격 JSON 파일
        #[arg(long, default_value = "adversarial_data.json")]
        attacks: PathBuf,

        /// 결과 JSON 파일
        #[arg(long, default_value = "live_safety_results.json")]
        out: PathBuf,
    },

    /// 단일 케이스에 Toxicity → Bias
    Safety {
        /// 입력 (기본: 내장 케이스)
        #[arg(long, requires = "output")]
        input: Option<String>,

        /// 모델 응답 (기본: 내장 케이스)
        #[arg(long, requires = "input")]
        output: Option<String>,

        /// 결과 JSON 파일
        #[arg(long, default_value = "safety_results.json")]
        out: PathBuf,
    },

    /// RAG 대상 적대적 질문 스위트
    Adversarial {
        /// 실행할 카테고리 (기본: 전체)
        #[arg(long = "category", value_enum)]
        categories: Vec<AdversarialCategory>,

        /// 결과 JSON 파일
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum JudgeCommand {
    /// 내장 케이스에 GEval 환각 검사
    Geval {
        /// 결과 JSON 파일
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// 단일 케이스 faithfulness (실패 시 non-zero 종료)
    Faithfulness {
        /// 입력 질문
        #[arg(long)]
        input: String,

        /// 모델 응답
        #[arg(long)]
        output: String,

        /// 검색 컨텍스트 (여러 번 지정 가능)
        #[arg(long = "context", required = true)]
        contexts: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum RagCommand {
    /// 질문하기 (기본: 데모 질문)
    Ask {
        /// 질문
        questions: Vec<String>,
    },

    /// 검색된 청크 확인
    Debug {
        /// 검색어
        #[arg(short, long)]
        query: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ExperimentCommand {
    /// 청크 크기 비교
    Chunking {
        /// 청크 크기 목록
        #[arg(long, value_delimiter = ',')]
        sizes: Vec<usize>,

        /// 청크 오버랩
        #[arg(long, default_value_t = EXPERIMENT_OVERLAP)]
        overlap: usize,

        /// 결과 JSON 파일
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// 가드레일 프롬프트 비교
    Prompts {
        /// 결과 JSON 파일
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// 골든 데이터셋에 faithfulness + answer relevancy
    Ragas {
        /// 골든 데이터셋 JSON (기본: 내장)
        #[arg(long)]
        golden: Option<PathBuf>,

        /// 결과 JSON 파일
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// 저장된 실험 결과로 품질 리포트 출력
    Report {
        /// `experiment chunking --out` 결과
        #[arg(long)]
        chunking: PathBuf,

        /// `experiment prompts --out` 결과
        #[arg(long)]
        prompts: PathBuf,
    },
}

// ============================================================================
// Runtime
// ============================================================================

/// 설정 + 전역 옵션으로 모델/저장소 생성
struct Runtime {
    settings: Settings,
    global: GlobalArgs,
}

impl Runtime {
    fn new(global: GlobalArgs) -> Result<Self> {
        let mut settings = Settings::load(global.config.as_deref())?;
        if global.no_wait {
            settings.pacing = Pacing {
                max_quota_waits: settings.pacing.max_quota_waits,
                ..Pacing::immediate()
            };
        }
        Ok(Self { settings, global })
    }

    fn pacing(&self) -> Pacing {
        self.settings.pacing.clone()
    }

    fn threshold(&self) -> f64 {
        self.settings.eval.threshold
    }

    /// 공격 대상 봇 (Gemini)
    fn bot(&self) -> Result<Arc<dyn LanguageModel>> {
        Ok(Arc::new(gemini_model(&self.settings, None, BOT_KEY_START)?))
    }

    fn judge(&self) -> Result<Arc<dyn LanguageModel>> {
        Ok(create_model(self.global.judge, &self.settings, JUDGE_KEY_START)?)
    }

    fn rag_llm(&self) -> Result<Arc<dyn LanguageModel>> {
        Ok(create_model(self.global.llm, &self.settings, BOT_KEY_START)?)
    }

    fn embedder(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        create_embedder(self.global.embedder, &self.settings)
    }

    async fn store(&self, collection: &str) -> Result<LanceVectorStore> {
        LanceVectorStore::open(
            &self.settings.rag.persist_path(),
            collection,
            self.settings.rag.metric,
        )
        .await
        .context("LanceDB 열기 실패")
    }

    /// 문서 폴더를 인덱싱한 파이프라인
    async fn pipeline(&self, collection: &str) -> Result<RagPipeline> {
        let docs = load_documents(&self.settings.rag.docs_dir)?;
        if docs.is_empty() {
            bail!(
                "문서 폴더에 .txt 파일이 없습니다: {}",
                self.settings.rag.docs_dir.display()
            );
        }
        println!("[*] 문서 {}개 인덱싱 중 (컬렉션: {})...", docs.len(), collection);

        let store = Arc::new(self.store(collection).await?);
        let pipeline = RagPipeline::build(
            &docs,
            RagConfig::from_settings(&self.settings.rag),
            store,
            self.embedder()?,
            self.rag_llm()?,
        )
        .await
        .context("RAG 파이프라인 생성 실패")?;

        println!("[OK] {}개 청크 인덱싱 완료", pipeline.chunk_count());
        Ok(pipeline)
    }
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let rt = Runtime::new(cli.global)?;

    match cli.command {
        Commands::Status => cmd_status(&rt).await,
        Commands::Generate { prompt } => cmd_generate(&rt, &prompt).await,
        Commands::Iso { command } => match command {
            IsoCommand::Single { scenarios, out_dir } => {
                cmd_iso(&rt, scenarios, &out_dir, false).await
            }
            IsoCommand::Batch { scenarios, out_dir } => {
                cmd_iso(&rt, scenarios, &out_dir, true).await
            }
        },
        Commands::Redteam { command } => match command {
            RedteamCommand::Bench { attacks, out } => cmd_redteam_bench(&rt, &attacks, &out).await,
            RedteamCommand::Safety { input, output, out } => {
                cmd_redteam_safety(&rt, input, output, &out).await
            }
            RedteamCommand::Adversarial { categories, out } => {
                cmd_redteam_adversarial(&rt, &categories, out.as_deref()).await
            }
        },
        Commands::Judge { command } => match command {
            JudgeCommand::Geval { out } => cmd_judge_geval(&rt, out.as_deref()).await,
            JudgeCommand::Faithfulness {
                input,
                output,
                contexts,
            } => cmd_judge_faithfulness(&rt, &input, &output, contexts).await,
        },
        Commands::Rag { command } => match command {
            RagCommand::Ask { questions } => cmd_rag_ask(&rt, questions).await,
            RagCommand::Debug { query } => cmd_rag_debug(&rt, query).await,
        },
        Commands::Experiment { command } => match command {
            ExperimentCommand::Chunking {
                sizes,
                overlap,
                out,
            } => cmd_experiment_chunking(&rt, sizes, overlap, out.as_deref()).await,
            ExperimentCommand::Prompts { out } => cmd_experiment_prompts(&rt, out.as_deref()).await,
            ExperimentCommand::Ragas { golden, out } => {
                cmd_experiment_ragas(&rt, golden.as_deref(), out.as_deref()).await
            }
            ExperimentCommand::Report { chunking, prompts } => {
                cmd_experiment_report(&chunking, &prompts)
            }
        },
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 상태 확인 명령어 (status)
async fn cmd_status(rt: &Runtime) -> Result<()> {
    let settings = &rt.settings;

    println!("palank-eval 상태");
    println!("================");
    println!();

    println!("데이터 디렉토리: {:?}", get_data_dir());
    println!("문서 폴더:       {:?}", settings.rag.docs_dir);
    println!("벡터 저장소:     {:?}", settings.rag.persist_path());
    println!(
        "RAG 설정:        chunk {} / overlap {} / top-k {} / {}",
        settings.rag.chunk_size,
        settings.rag.chunk_overlap,
        settings.rag.top_k,
        settings.rag.metric
    );
    println!();

    // API 키
    match KeyPool::from_env(&settings.gemini.key_vars) {
        Ok(pool) => println!(
            "[OK] Gemini 키 {}개: {}",
            pool.len(),
            pool.labels().join(", ")
        ),
        Err(e) => println!("[!] Gemini 키 없음: {}", e),
    }
    println!(
        "     모델: {} (생성: {})",
        settings.gemini.model, settings.gemini.generation_model
    );

    // Ollama
    match ollama_model(settings)?.list_models().await {
        Ok(models) => {
            println!(
                "[OK] Ollama ({}): {}개 모델",
                settings.ollama.base_url,
                models.len()
            );
            for model in &models {
                println!("     - {}", model);
            }
            for (role, model) in [
                ("생성", &settings.ollama.model),
                ("임베딩", &settings.ollama.embed_model),
            ] {
                if is_model_installed(&models, model) {
                    println!("[OK] {} 모델 설치됨: {}", role, model);
                } else {
                    println!("[!] {} 모델 없음: {} (ollama pull {})", role, model, model);
                }
            }
        }
        Err(e) => println!("[!] Ollama 연결 실패: {}", e),
    }
    println!();

    // 컬렉션
    let store = rt.store(&settings.rag.collection).await?;
    let mut names = store.collections().await?;
    names.sort();
    if names.is_empty() {
        println!("컬렉션 없음");
    } else {
        println!("컬렉션:");
        for name in names {
            let count = store.with_collection(&name).count().await?;
            println!("  {:<20} {} 청크", name, count);
        }
    }

    Ok(())
}

/// 단일 생성 명령어 (generate)
async fn cmd_generate(rt: &Runtime, prompt: &str) -> Result<()> {
    let model = gemini_model(&rt.settings, None, BOT_KEY_START)?;
    println!(
        "[*] {} 호출 중 (키 {}개)...",
        model.model_name(),
        model.keys().len()
    );

    let text = model.generate(prompt).await.context("Gemini 호출 실패")?;
    println!("\n{}", text);
    Ok(())
}

/// ISO 시나리오 생성 명령어 (iso single / batch)
async fn cmd_iso(rt: &Runtime, scenarios: Vec<String>, out_dir: &Path, batch: bool) -> Result<()> {
    let defaults = if batch {
        dataset::ISO_BATCH_SCENARIOS
    } else {
        dataset::ISO_SINGLE_SCENARIOS
    };
    let scenarios: Vec<String> = if scenarios.is_empty() {
        defaults.iter().map(|s| s.to_string()).collect()
    } else {
        scenarios
    };

    let model = gemini_model(
        &rt.settings,
        Some(&rt.settings.gemini.generation_model),
        BOT_KEY_START,
    )?;
    let generator = IsoGenerator::new(Arc::new(model), rt.pacing());

    let generated: Vec<GeneratedScenario> = if batch {
        println!("[*] 시나리오 {}개 배치 생성 중...", scenarios.len());
        generator.generate_batch(&scenarios).await?
    } else {
        generator.generate_each(&scenarios).await
    };

    if generated.is_empty() {
        bail!("생성된 시나리오가 없습니다");
    }

    for saved in save_scenarios(out_dir, &generated)? {
        match saved.validation {
            Ok(()) => println!("[OK] {} → {:?} (well-formed XML)", saved.name, saved.path),
            Err(e) => println!("[!] {} → {:?} (XML 오류: {})", saved.name, saved.path, e),
        }
    }

    Ok(())
}

/// 레드팀 벤치마크 명령어 (redteam bench)
async fn cmd_redteam_bench(rt: &Runtime, attacks: &Path, out: &Path) -> Result<()> {
    let file = AttackFile::load(attacks)?;
    println!(
        "[*] 공격 {}개 로드 ({})",
        file.attacks.len(),
        file.categories().join(", ")
    );

    let metric: Arc<dyn Metric> = Arc::new(ToxicityMetric::new(rt.judge()?, rt.threshold()));
    let bench = RedTeamBench::new(rt.bot()?, metric, rt.pacing());

    let records = bench.run(&file.attacks).await;
    save_records(out, &records)?;
    print_summary(&records);
    println!("[OK] 결과 저장: {:?}", out);
    Ok(())
}

/// 안전성 평가 명령어 (redteam safety)
async fn cmd_redteam_safety(
    rt: &Runtime,
    input: Option<String>,
    output: Option<String>,
    out: &Path,
) -> Result<()> {
    let case = match (input, output) {
        (Some(input), Some(output)) => LlmTestCase::new(input, output),
        _ => dataset::safety_case(),
    };

    println!("[*] 안전성 평가: {}", case.input);
    let evaluation = SafetyEvaluation::with_judge(rt.judge()?, rt.threshold(), rt.pacing());
    let records = evaluation.run(&case).await;

    save_records(out, &records)?;
    print_summary(&records);
    println!("[OK] 결과 저장: {:?}", out);
    Ok(())
}

/// 적대적 스위트 명령어 (redteam adversarial)
async fn cmd_redteam_adversarial(
    rt: &Runtime,
    categories: &[AdversarialCategory],
    out: Option<&Path>,
) -> Result<()> {
    let suite = AdversarialSuite::new(dataset::adversarial_cases()).filter(categories);
    if suite.cases().is_empty() {
        bail!("실행할 케이스가 없습니다");
    }

    let pipeline = rt.pipeline(&rt.settings.rag.collection).await?;
    println!("[*] 적대적 케이스 {}개 실행\n", suite.cases().len());

    let report = suite.run(&pipeline).await;

    println!("\n카테고리별 결과:");
    for (category, summary) in &report.summary {
        println!(
            "  {:<18} 통과 {}/{} (실패 {}, 에러 {})",
            category.as_str(),
            summary.passed,
            summary.total(),
            summary.failed,
            summary.errored
        );
    }

    if let Some(path) = out {
        report.save(path)?;
        println!("[OK] 결과 저장: {:?}", path);
    }

    if !report.all_passed() {
        bail!(
            "적대적 스위트 실패: {}/{} 통과",
            report.passed(),
            report.total()
        );
    }
    println!("\n[OK] 전체 통과 ({}/{})", report.passed(), report.total());
    Ok(())
}

/// GEval 환각 검사 명령어 (judge geval)
async fn cmd_judge_geval(rt: &Runtime, out: Option<&Path>) -> Result<()> {
    let metric = GEval::new(
        rt.judge()?,
        dataset::HALLUCINATION_CHECK_NAME,
        dataset::HALLUCINATION_CRITERIA,
        dataset::HALLUCINATION_PARAMS.to_vec(),
        rt.threshold(),
    );
    let pacing = rt.pacing();

    let cases = dataset::hallucination_cases();
    let mut records = Vec::with_capacity(cases.len());

    for (i, case) in cases.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(pacing.metric_interval()).await;
        }

        println!("\n[*] 입력: {}", case.input);
        println!("    실제: {}", case.actual_output);
        if let Some(expected) = &case.expected_output {
            println!("    기대: {}", expected);
        }

        match metric.measure(case).await {
            Ok(outcome) => {
                let record = EvalRecord::from_outcome(metric.name(), &outcome);
                println!(
                    "[{}] {} 점수 {:.2}: {}",
                    if record.passed() { "OK" } else { "!" },
                    record.metric,
                    record.score,
                    record.reason
                );
                records.push(record);
            }
            Err(e) => println!("[!] {} 실패: {}", metric.name(), e),
        }
    }

    print_summary(&records);
    if let Some(path) = out {
        save_records(path, &records)?;
        println!("[OK] 결과 저장: {:?}", path);
    }
    Ok(())
}

/// faithfulness 단일 검사 명령어 (judge faithfulness)
async fn cmd_judge_faithfulness(
    rt: &Runtime,
    input: &str,
    output: &str,
    contexts: Vec<String>,
) -> Result<()> {
    let metric = FaithfulnessMetric::new(rt.judge()?, rt.threshold());
    let case = LlmTestCase::new(input, output).with_context(contexts);

    let outcome = metric.measure(&case).await.context("Faithfulness 측정 실패")?;
    println!(
        "{} 점수 {:.2} (기준 {:.2}): {}",
        metric.name(),
        outcome.score,
        metric.threshold(),
        outcome.reason
    );

    if !outcome.success {
        bail!("Faithfulness 검사 실패: 점수 {:.2}", outcome.score);
    }
    println!("[OK] 통과");
    Ok(())
}

/// RAG 질문 명령어 (rag ask)
async fn cmd_rag_ask(rt: &Runtime, questions: Vec<String>) -> Result<()> {
    let questions: Vec<String> = if questions.is_empty() {
        dataset::DEMO_QUESTIONS.iter().map(|q| q.to_string()).collect()
    } else {
        questions
    };

    let pipeline = rt.pipeline(&rt.settings.rag.collection).await?;

    for question in &questions {
        let answer = pipeline.invoke(question).await?;
        println!("\nQ: {}", question);
        println!("A: {}", answer.trim());
        println!("{}", "-".repeat(50));
    }
    Ok(())
}

/// 검색 확인 명령어 (rag debug)
async fn cmd_rag_debug(rt: &Runtime, query: Option<String>) -> Result<()> {
    let query = query.unwrap_or_else(|| dataset::DEBUG_QUERY.to_string());
    let pipeline = rt.pipeline(&rt.settings.rag.collection).await?;

    let results = pipeline.retrieve(&query).await?;
    println!("\n[*] \"{}\" 검색 결과 {}건:", query, results.len());

    for (i, result) in results.iter().enumerate() {
        let preview: String = result.chunk_text.chars().take(DEBUG_PREVIEW_CHARS).collect();
        println!(
            "\n--- 청크 {} (유사도 {:.3}) ---",
            i + 1,
            result.similarity
        );
        println!("출처: {} #{}", result.source, result.chunk_index);
        println!("{}...", preview);
    }
    Ok(())
}

/// 청크 크기 실험 명령어 (experiment chunking)
async fn cmd_experiment_chunking(
    rt: &Runtime,
    sizes: Vec<usize>,
    overlap: usize,
    out: Option<&Path>,
) -> Result<()> {
    let sizes = if sizes.is_empty() {
        DEFAULT_CHUNK_SIZES.to_vec()
    } else {
        sizes
    };
    let docs = load_documents(&rt.settings.rag.docs_dir)?;

    let experiment = ChunkingExperiment::new(
        rt.store(&rt.settings.rag.collection).await?,
        rt.embedder()?,
        rt.rag_llm()?,
        rt.settings.rag.top_k,
    )
    .with_overlap(overlap);

    let runs = experiment
        .run(&docs, &sizes, dataset::ANSWERABLE_QUESTIONS)
        .await?;

    println!("\n{}", "=".repeat(60));
    for run in &runs {
        println!(
            "{:>5} chars: {} 청크, 검색 실패 {}/{}",
            run.chunk_size,
            run.chunk_count,
            run.retrieval_failures(),
            run.answers.len()
        );
    }

    if let Some(path) = out {
        write_pretty_json(path, &runs)?;
        println!("[OK] 결과 저장: {:?}", path);
    }
    Ok(())
}

/// 프롬프트 실험 명령어 (experiment prompts)
async fn cmd_experiment_prompts(rt: &Runtime, out: Option<&Path>) -> Result<()> {
    let base = rt.pipeline("prompt_exp").await?;
    let runs = run_prompt_experiment(
        &base,
        &GuardrailLevel::ALL,
        dataset::ANSWERABLE_QUESTIONS,
        dataset::UNANSWERABLE_QUESTIONS,
    )
    .await?;

    println!("\n{}", "=".repeat(70));
    for run in &runs {
        println!(
            "{:<18} 답변 {}/{}, 기권 {}/{}, 환각률 {:.0}%",
            run.level.template().name,
            run.answered(),
            run.answerable.len(),
            run.abstained(),
            run.unanswerable.len(),
            run.hallucination_rate() * 100.0
        );
    }

    if let Some(path) = out {
        write_pretty_json(path, &runs)?;
        println!("[OK] 결과 저장: {:?}", path);
    }
    Ok(())
}

/// RAGAS 방식 평가 명령어 (experiment ragas)
async fn cmd_experiment_ragas(
    rt: &Runtime,
    golden: Option<&Path>,
    out: Option<&Path>,
) -> Result<()> {
    let dataset = GoldenDataset::load_or_builtin(golden)?;
    if dataset.is_empty() {
        bail!("골든 데이터셋이 비어 있습니다");
    }

    let pipeline = rt.pipeline("ragas_test").await?;
    let evaluation = RagasEvaluation::new(rt.judge()?, rt.embedder()?, rt.threshold(), rt.pacing());
    let report = evaluation.run(&pipeline, &dataset).await?;

    print_report(&report);
    if let Some(path) = out {
        write_pretty_json(path, &report)?;
        println!("[OK] 결과 저장: {:?}", path);
    }
    Ok(())
}

/// 품질 리포트 명령어 (experiment report)
fn cmd_experiment_report(chunking: &Path, prompts: &Path) -> Result<()> {
    let chunking: Vec<ChunkingRun> = experiment::load_results(chunking)?;
    let prompts: Vec<PromptRun> = experiment::load_results(prompts)?;

    let report = QualityReport::build(&chunking, &prompts)?;
    print!("{}", report.render());
    Ok(())
}

/// PASS/FAIL 요약 출력
fn print_summary(records: &[EvalRecord]) {
    let passed = records.iter().filter(|r| r.passed()).count();
    println!(
        "\n[*] 결과: PASS {} / FAIL {} (총 {})",
        passed,
        records.len() - passed,
        records.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "palank-eval",
            "redteam",
            "adversarial",
            "--category",
            "missing_info",
            "--category",
            "prompt_injection",
            "--no-wait",
            "--judge",
            "ollama",
        ])
        .unwrap();

        assert!(cli.global.no_wait);
        assert_eq!(cli.global.judge, ModelProvider::Ollama);
        match cli.command {
            Commands::Redteam {
                command: RedteamCommand::Adversarial { categories, out },
            } => {
                assert_eq!(
                    categories,
                    vec![
                        AdversarialCategory::MissingInfo,
                        AdversarialCategory::PromptInjection
                    ]
                );
                assert!(out.is_none());
            }
            _ => panic!("unexpected command"),
        }
    }

    #[test]
    fn test_parse_chunk_sizes() {
        let cli = Cli::try_parse_from([
            "palank-eval",
            "experiment",
            "chunking",
            "--sizes",
            "200,500",
        ])
        .unwrap();
        match cli.command {
            Commands::Experiment {
                command: ExperimentCommand::Chunking { sizes, overlap, .. },
            } => {
                assert_eq!(sizes, vec![200, 500]);
                assert_eq!(overlap, 50);
            }
            _ => panic!("unexpected command"),
        }
    }

    #[test]
    fn test_faithfulness_requires_context() {
        assert!(Cli::try_parse_from([
            "palank-eval",
            "judge",
            "faithfulness",
            "--input",
            "q",
            "--output",
            "a",
        ])
        .is_err());
    }

    #[test]
    fn test_safety_input_requires_output() {
        assert!(Cli::try_parse_from(["palank-eval", "redteam", "safety", "--input", "q"]).is_err());
    }
}
