use card_price_common::{
    explain_extraction, ocr_jobs, review_status, segment, CatalogIndex, CatalogSource, Template, TemplateStore,
    TemplateSummary,
};
use card_price_scan::{cache, catalog, cli, config, error, export, ocr, pipeline, review, scanner, store};
use clap::Parser;
use cli::{Cli, Commands, TemplateCommand};
use config::Config;
use error::{Result, ScanError};
use std::path::{Path, PathBuf};
use store::FileTemplateStore;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = Config::load()?;

    match cli.command {
        Commands::Template { action } => {
            let mut store = FileTemplateStore::new(config.templates_dir()?);
            run_template_command(&mut store, action)?;
        }

        Commands::Segment { template: template_id, image: image_path, save_crops, ratios } => {
            println!("✂ card-price - 切り出し\n");

            let store = FileTemplateStore::new(config.templates_dir()?);
            let template = load_template(&store, &template_id)?;
            let img = image::open(&image_path)
                .map_err(|e| ScanError::ImageLoad(format!("{}: {}", image_path.display(), e)))?;

            let mut segment_ratios = config.recognition.ratios;
            ratios.apply(&mut segment_ratios);

            let crops = segment(&template, img.width(), img.height(), &segment_ratios);
            println!("画像: {}x{}px / テンプレート: {}", img.width(), img.height(), template.name);
            for crop in &crops {
                let r = crop.region;
                print!(
                    "  {} [{}] x={} y={} {}x{}",
                    review::cell_label(crop.row, crop.col),
                    crop.cell_type,
                    r.x,
                    r.y,
                    r.width,
                    r.height
                );
                if let Some(p) = crop.price_region {
                    print!(" / 価格帯 y={} {}x{}", p.y, p.width, p.height);
                }
                println!();
            }
            println!("✔ {}件の切り出し", crops.len());

            if let Some(dir) = save_crops {
                std::fs::create_dir_all(&dir)?;
                for (key, region) in ocr_jobs(&crops) {
                    let png = ocr::encode_crop(&img, &region)?;
                    let name = key.to_string().replace(',', "_");
                    std::fs::write(dir.join(format!("r{}.png", name)), png)?;
                }
                println!("✔ 切り出し画像を保存: {}", dir.display());
            }
        }

        Commands::Extract { text, file } => {
            let raw = match (text, file) {
                (Some(text), _) => text.replace("\\n", "\n"),
                (None, Some(path)) => std::fs::read_to_string(path)?,
                (None, None) => std::io::read_to_string(std::io::stdin())?,
            };

            let extraction = explain_extraction(&raw, &config.recognition.extraction);
            for decision in &extraction.decisions {
                println!(
                    "  {:<24} → {}{}",
                    decision.line,
                    decision.verdict,
                    decision
                        .normalized
                        .as_deref()
                        .map(|n| format!(" ({})", n))
                        .unwrap_or_default()
                );
            }
            match extraction.candidate {
                Some(name) if extraction.used_fallback => println!("✔ カード名: {} (先頭行で代替)", name),
                Some(name) => println!("✔ カード名: {}", name),
                None => println!("カード名を抽出できませんでした"),
            }
        }

        Commands::Match { name, catalog: catalog_path, threshold, max_results } => {
            let cards = catalog::FileCatalog::new(&catalog_path).list_cards()?;
            let mut options = config.recognition.matching;
            if let Some(t) = threshold {
                options.threshold = t.min(100);
            }
            if let Some(n) = max_results {
                options.max_results = n;
            }

            let index = CatalogIndex::new(&cards);
            let candidates = index.lookup(&name, &options);
            if candidates.is_empty() {
                println!("閾値 {} 以上の候補はありません", options.threshold);
            }
            for (i, c) in candidates.iter().enumerate() {
                println!("  {}. {} (ID: {}) {}%", i + 1, c.name, c.catalog_id, c.similarity);
            }
        }

        Commands::Recognize {
            input,
            template: template_id,
            catalog: catalog_path,
            output,
            format,
            fixture,
            ocr_command,
            use_cache,
            threshold,
            ratios,
        } => {
            println!("🃏 card-price - 価格表認識\n");

            let mut recognition = config.recognition.clone();
            ratios.apply(&mut recognition.ratios);
            if let Some(t) = threshold {
                recognition.matching.threshold = t.min(100);
            }

            let store = FileTemplateStore::new(config.templates_dir()?);
            let template = load_template(&store, &template_id)?;

            // 1. 画像スキャン
            println!("[1/4] 画像をスキャン中...");
            let images = scanner::scan_input(&input)?;
            if images.is_empty() {
                return Err(ScanError::NoImagesFound(input.display().to_string()));
            }
            println!("✔ {}枚の価格表を検出\n", images.len());

            // 2. カタログ読み込み
            println!("[2/4] カタログを読み込み中...");
            let cards = catalog::FileCatalog::new(&catalog_path).list_cards()?;
            println!("✔ {}件のカード\n", cards.len());

            // 3. OCR・照合
            let backend = match fixture {
                Some(path) => ocr::OcrBackend::Fixture(ocr::FixtureOcr::load(&path)?),
                None => {
                    let command = ocr_command.unwrap_or_else(|| config.ocr_command());
                    ocr::OcrBackend::Command(ocr::CommandOcr::new(
                        command,
                        config.ocr_timeout_seconds,
                        config.ocr_concurrency,
                    )?)
                }
            };
            println!("[3/4] OCR・照合中...{}", if use_cache { " (キャッシュ有効)" } else { "" });
            let options = pipeline::PipelineOptions { use_cache, show_progress: true };
            let recognized =
                pipeline::recognize_images(&images, &template, &cards, &recognition, &backend, options).await?;

            if recognized.len() < images.len() {
                println!("⚠ {}枚の画像を読み込めずスキップしました", images.len() - recognized.len());
            }
            let total: usize = recognized.iter().map(|r| r.results.len()).sum();
            let needs_review = recognized
                .iter()
                .flat_map(|r| r.results.iter())
                .filter(|r| review_status(r, &config.review).needs_review())
                .count();
            println!("✔ {}件のカードを認識（要確認: {}件）\n", total, needs_review);

            // 4. 出力
            println!("[4/4] 結果を保存中...");
            let summary = TemplateSummary {
                id: template.id.clone().unwrap_or_default(),
                name: template.name.clone(),
            };
            let report = export::RecognitionReport::new(summary, recognized);
            let output = output.unwrap_or_else(|| default_output_dir(&input));
            export::export_report(&report, &format, &output, &config.review)?;

            println!("\n✅ 認識完了");
        }

        Commands::Review { input, output } => {
            println!("🔍 card-price - 認識結果の確認\n");
            review::run_interactive_review(&input, output.as_deref(), &config.review)?;
        }

        Commands::Config { set_ocr_command, set_threshold, set_templates_dir, show } => {
            let mut config = config;
            let mut changed = false;

            if let Some(command) = set_ocr_command {
                config.set_ocr_command(command)?;
                println!("✔ OCRコマンドを設定しました");
                changed = true;
            }
            if let Some(threshold) = set_threshold {
                config.set_threshold(threshold)?;
                println!("✔ 閾値を設定しました");
                changed = true;
            }
            if let Some(dir) = set_templates_dir {
                config.templates_dir = Some(dir);
                println!("✔ テンプレート保存先を設定しました");
                changed = true;
            }
            if changed {
                config.save()?;
            }

            if show || !changed {
                let r = &config.recognition;
                println!("設定:");
                println!("  OCRコマンド: {}", config.ocr_command());
                println!("  OCRタイムアウト: {}秒", config.ocr_timeout_seconds);
                println!("  OCR同時実行数: {}", config.ocr_concurrency);
                println!("  テンプレート保存先: {}", config.templates_dir()?.display());
                println!("  照合閾値: {} / 最大候補数: {}", r.matching.threshold, r.matching.max_results);
                println!(
                    "  確認基準: 類似度{}以上 / 1位と2位の差{}以上",
                    config.review.confident_similarity, config.review.ambiguity_margin
                );
                println!(
                    "  抽出: 先頭{}行 / 最小{}文字",
                    r.extraction.max_lines, r.extraction.min_length
                );
                println!(
                    "  切り出し: ヘッダー{}% フッター{}% 価格帯{}% 余白{}%",
                    r.ratios.header_ratio, r.ratios.footer_ratio, r.ratios.price_row_ratio, r.ratios.side_padding
                );
            }
        }

        Commands::Cache { clear, folder, info } => {
            let target = folder.unwrap_or_else(|| PathBuf::from("."));
            let cache_path = cache::CacheFile::cache_path(&target);

            if info || !clear {
                if cache_path.exists() {
                    let cache = cache::CacheFile::load(&target);
                    println!("キャッシュ情報:");
                    println!("  パス: {}", cache_path.display());
                    println!("  件数: {}", cache.len());
                    if let Ok(meta) = std::fs::metadata(&cache_path) {
                        println!("  サイズ: {} bytes", meta.len());
                    }
                } else {
                    println!("キャッシュファイルが存在しません: {}", cache_path.display());
                }
            }

            if clear {
                match cache::CacheFile::clear(&target) {
                    Ok(true) => println!("✔ キャッシュを削除しました: {}", cache_path.display()),
                    Ok(false) => println!("キャッシュファイルが存在しません"),
                    Err(e) => println!("キャッシュ削除エラー: {}", e),
                }
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn load_template(store: &FileTemplateStore, id: &str) -> Result<Template> {
    store.get_template(id).map_err(|e| match e {
        card_price_common::Error::NotFound(_) => ScanError::TemplateNotFound(id.to_string()),
        e => e.into(),
    })
}

/// 入力がファイルならその親、フォルダならそのフォルダ
fn default_output_dir(input: &Path) -> PathBuf {
    if input.is_file() {
        input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    } else {
        input.to_path_buf()
    }
}

fn run_template_command(store: &mut FileTemplateStore, action: TemplateCommand) -> Result<()> {
    match action {
        TemplateCommand::New { name, columns, rows } => {
            let template = Template::with_grid(name, columns, rows);
            let id = store.save_template(template)?;
            println!("✔ テンプレートを作成しました: {}", id);
        }

        TemplateCommand::List => {
            let list = store.list_templates()?;
            if list.is_empty() {
                println!("テンプレートがありません: {}", store.dir().display());
            }
            for summary in list {
                println!("  {}  {}", summary.id, summary.name);
            }
        }

        TemplateCommand::Show { id } => {
            let template = load_template(store, &id)?;
            print_template(&id, &template);
        }

        TemplateCommand::Delete { id } => {
            load_template(store, &id)?;
            store.delete_template(&id)?;
            println!("✔ 削除しました: {}", id);
        }

        TemplateCommand::AddLine { id, axis } => {
            let mut template = load_template(store, &id)?;
            let index = template.add_line(axis)?;
            let position = template.lines(axis)[index];
            store.save_template(template)?;
            println!("✔ {}を追加しました: #{} ({:.1}%)", axis, index, position);
        }

        TemplateCommand::MoveLine { id, axis, index, position } => {
            let mut template = load_template(store, &id)?;
            let new_index = template.move_line(axis, index, position)?;
            let moved_to = template.lines(axis)[new_index];
            store.save_template(template)?;
            println!("✔ {} #{} を {:.1}% に移動しました（新しい番号: #{}）", axis, index, moved_to, new_index);
        }

        TemplateCommand::DeleteLine { id, axis, index } => {
            let mut template = load_template(store, &id)?;
            template.delete_line(axis, index)?;
            store.save_template(template)?;
            println!("✔ {} #{} を削除しました", axis, index);
        }

        TemplateCommand::SetCell { id, row, col, cell_type } => {
            let mut template = load_template(store, &id)?;
            template.set_cell(row, col, cell_type)?;
            store.save_template(template)?;
            println!("✔ 行{} 列{} → {}", row, col, cell_type);
        }

        TemplateCommand::SetRow { id, row, cell_type } => {
            let mut template = load_template(store, &id)?;
            template.set_row(row, cell_type)?;
            store.save_template(template)?;
            println!("✔ 行{} → {}", row, cell_type);
        }

        TemplateCommand::SetColumn { id, col, cell_type } => {
            let mut template = load_template(store, &id)?;
            template.set_column(col, cell_type)?;
            store.save_template(template)?;
            println!("✔ 列{} → {}", col, cell_type);
        }
    }

    Ok(())
}

fn print_template(id: &str, template: &Template) {
    let format_lines = |lines: Vec<f64>| {
        lines
            .iter()
            .enumerate()
            .map(|(i, p)| format!("#{}:{:.1}", i, p))
            .collect::<Vec<_>>()
            .join(" ")
    };

    println!("{} ({})", template.name, id);
    println!("  縦線: {}", format_lines(template.vertical_lines()));
    println!("  横線: {}", format_lines(template.horizontal_lines()));
    println!("  セル ({}行 x {}列):", template.rows(), template.columns());
    for (r, row) in template.cells().iter().enumerate() {
        let cells: Vec<String> = row.iter().map(|c| format!("{:<7}", c.to_string())).collect();
        println!("    {:>2}: {}", r, cells.join(" "));
    }
}
