pub mod error;
pub mod io;
pub mod llm;
pub mod models;
pub mod stages;

pub use error::RateError;
pub use io::{
    attach_audio_clips, load_results, load_terminal_keys, merge_features_file,
    parse_segments_file, parse_segments_json, render_report, write_analysis, ResultWriter,
};
pub use llm::{
    build_request, extract_label, http_client, HttpRatingClient, HttpTransport, RatingClient,
    RatingConfig, RatingTransport,
};
pub use models::{
    AnalysisRecord, ClassificationRequest, ClassificationResult, ConfusionMatrix, EmpathyScale,
    MatchQuality, Modality, ResultStatus, Segment, SegmentSet,
};
pub use stages::{execute_classify, execute_evaluate, ClassifyConfig, PairKey};
