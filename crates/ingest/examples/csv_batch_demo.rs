use std::io::Cursor;

use ingest::{batched, normalize, CsvSource, IngestConfig};

fn main() {
    let cfg = IngestConfig {
        batch_size: 2,
        ..Default::default()
    };
    if let Err(err) = cfg.validate() {
        panic!("invalid config: {err}");
    }

    let csv = "Name,Age,Medical Condition\n\
               Bobby Jackson,30,Cancer\n\
               LesLie TErRy,62,\n\
               ,,\n\
               Danny Smith,76,Obesity\n";

    let source = match CsvSource::from_reader(Cursor::new(csv), b',', encoding_rs::UTF_8) {
        Ok(source) => source,
        Err(err) => panic!("failed to read header: {err}"),
    };
    println!("headers: {:?}", source.headers().collect::<Vec<_>>());

    let documents = source.filter_map(Result::ok).filter_map(normalize);
    let Ok(batches) = batched(documents, 2) else {
        panic!("batch size must be positive");
    };

    for (idx, batch) in batches.enumerate() {
        println!("batch {idx} ({} documents)", batch.len());
        for doc in batch.documents() {
            println!("  {doc:?}");
        }
    }
}
