use approx::assert_relative_eq;
use murmur_core::audio::SampleFormat;
use murmur_core::config::default_schema;
use murmur_core::decoder::Stage;
use murmur_core::grammar::{fsg_text, Transition};
use murmur_core::{
    AlignmentDepth, Config, Decoder, DecoderState, MemoryLoader, MurmurError, Pcm, StubEngine,
};

const DICT: &str = "\
;; test lexicon
go G OW
forward F AO R W ER D
forward(2) F AO W ER D
back B AE K
turn T ER N
left L EH F T
right R AY T
";

const NOISE: &str = "<sil> SIL\n[breath] +BREATH+\n";

const NAV: &str = r#"
#JSGF V1.0;
grammar nav;
<dir> = left | right;
public <move> = /0.8/ go forward | /0.2/ go back;
public <turn> = turn <dir>;
"#;

const GO_FORWARD: &str = "\
FSG_BEGIN goforward
NUM_STATES 3
START_STATE 0
FINAL_STATE 2
TRANSITION 0 1 1.0 go
TRANSITION 1 2 1.0 forward
FSG_END
";

/// Every model resource under `model/`.
fn full_models() -> MemoryLoader {
    minimal_models()
        .with("model/feature_transform", b"lda".to_vec())
        .with("model/sendump", b"sendump".to_vec())
        .with("model/noisedict.txt", NOISE)
        .with("model/feat_params.json", r#"{"-lowerf": 130, "-upperf": 6800, "-bogus": 1}"#)
}

/// Only the resources the pipeline cannot do without.
fn minimal_models() -> MemoryLoader {
    MemoryLoader::new()
        .with("model/mdef", b"mdef".to_vec())
        .with("model/transition_matrices", b"tmat".to_vec())
        .with("model/means", b"means".to_vec())
        .with("model/variances", b"variances".to_vec())
        .with("model/mixture_weights", b"mixw".to_vec())
        .with("model/dict.txt", DICT)
        .with("grammar/nav.gram", NAV)
        .with("grammar/goforward.fsg", GO_FORWARD)
}

fn decoder(loader: MemoryLoader) -> Decoder {
    let mut decoder = Decoder::new(StubEngine::new(), loader);
    decoder.config_mut().set("hmm", "model").unwrap();
    decoder
}

async fn ready_with_jsgf() -> Decoder {
    let mut d = decoder(full_models());
    d.config_mut().set("jsgf", "grammar/nav.gram").unwrap();
    d.initialize().await.unwrap();
    d
}

fn stub_of(d: &Decoder) -> &StubEngine {
    d.engine().as_any().downcast_ref::<StubEngine>().unwrap()
}

fn one_second() -> Vec<i16> {
    (0..16_000).map(|i| ((i % 100) as i16 - 50) * 100).collect()
}

#[tokio::test]
async fn go_forward_end_to_end() {
    let mut d = ready_with_jsgf().await;
    assert_eq!(d.state(), DecoderState::Ready);
    assert_eq!(d.grammar().unwrap().name(), "nav.move");

    d.start().unwrap();
    assert_eq!(d.state(), DecoderState::InUtterance);
    let frames = d.process(Pcm::Int16(&one_second())).unwrap();
    assert_eq!(frames, 100);
    d.stop().unwrap();

    assert_eq!(d.hypothesis().unwrap(), "go forward");
    let segments = d.segments().unwrap();
    let words: Vec<&str> = segments.iter().map(|s| s.word.as_str()).collect();
    assert_eq!(words, ["go", "forward"]);
    assert_relative_eq!(segments[0].start, 0.0);
    assert_relative_eq!(segments[1].end, 1.0, epsilon = 1e-9);
    for pair in segments.windows(2) {
        assert!(pair[0].end <= pair[1].start);
    }
    for s in &segments {
        assert!(s.start <= s.end);
    }
}

#[tokio::test]
async fn transition_list_recognizes_every_word() {
    let mut d = decoder(full_models());
    d.initialize().await.unwrap();
    d.add_word("ten", "T EH N").unwrap();
    d.add_word("meters", "M IY T ER Z").unwrap();

    let transitions = [
        Transition::word(0, 1, "go", 1.0),
        Transition::word(1, 2, "forward", 1.0),
        Transition::word(2, 3, "ten", 1.0),
        Transition::word(3, 4, "meters", 1.0),
    ];
    d.set_grammar("goforward", 0, 4, &transitions).unwrap();
    assert_eq!(d.grammar().unwrap().n_state(), 5);

    d.start().unwrap();
    for chunk in one_second().chunks(1_024) {
        d.process(Pcm::Int16(chunk)).unwrap();
    }
    d.stop().unwrap();

    assert_eq!(d.hypothesis().unwrap(), "go forward ten meters");
    let segments = d.segments().unwrap();
    assert_eq!(segments.len(), 4);
    for pair in segments.windows(2) {
        assert!(pair[0].start <= pair[0].end);
        assert!(pair[0].end <= pair[1].start);
    }
    assert_eq!(d.diagnostics().frames, 100);
    assert_eq!(d.diagnostics().utterances, 1);
}

#[tokio::test]
async fn alignment_depths_nest() {
    let mut d = ready_with_jsgf().await;
    d.start().unwrap();
    d.process(Pcm::Int16(&one_second())).unwrap();
    d.stop().unwrap();

    let words = d.alignment(AlignmentDepth::Words).unwrap();
    assert!(words.iter().all(|w| w.children.is_empty()));

    let phones = d.alignment(AlignmentDepth::Phones).unwrap();
    let go: Vec<&str> = phones[0].children.iter().map(|p| p.text.as_str()).collect();
    assert_eq!(go, ["G", "OW"]);
    assert!(phones[0].children.iter().all(|p| p.children.is_empty()));

    let states = d.alignment(AlignmentDepth::States).unwrap();
    for phone in &states[1].children {
        assert_eq!(phone.children.len(), 3);
        let covered: u32 = phone.children.iter().map(|s| s.duration).sum();
        assert_eq!(covered, phone.duration);
    }
}

#[tokio::test]
async fn engine_stages_run_in_order() {
    let engine = StubEngine::new();
    let journal = engine.journal();
    let mut d = Decoder::new(engine, full_models());
    d.config_mut().set("hmm", "model").unwrap();
    d.config_mut().set("fsg", "grammar/goforward.fsg").unwrap();
    d.initialize().await.unwrap();

    assert_eq!(
        *journal.lock(),
        [
            Stage::Cleanup,
            Stage::Frontend,
            Stage::Feature,
            Stage::AcousticModelPre,
            Stage::Mdef,
            Stage::Tmat,
            Stage::Gmm,
            Stage::AcousticModelPost,
            Stage::Dictionary,
            Stage::Grammar,
        ]
    );
    let diag = d.diagnostics();
    assert_eq!(diag.stages_completed, 12);
    assert_eq!(diag.fallbacks_taken, 0);
    assert_eq!(d.grammar().unwrap().name(), "goforward");

    let stub = stub_of(&d);
    assert!(stub.has_transform());
    assert_eq!(stub.mixture_weights(), Some("sendump"));
    assert!(stub.is_filler("[breath]"));
}

#[tokio::test]
async fn optional_resources_fall_back() {
    let mut d = decoder(minimal_models());
    d.initialize().await.unwrap();

    // transform, sendump, filler dictionary, feature parameters
    assert_eq!(d.diagnostics().fallbacks_taken, 4);
    let stub = stub_of(&d);
    assert!(!stub.has_transform());
    assert_eq!(stub.mixture_weights(), Some("mixw"));
    assert!(!stub.is_filler("<sil>"));
    assert!(d.grammar().is_none());
    assert!(d.lookup_word("<sil>").unwrap().is_none());
    assert_eq!(d.lookup_word("go").unwrap().as_deref(), Some("G OW"));
}

#[tokio::test]
async fn missing_required_resource_is_fatal() {
    let mut loader = minimal_models();
    loader.remove("model/mixture_weights");
    let mut d = decoder(loader);

    let err = d.initialize().await.unwrap_err();
    assert!(
        matches!(&err, MurmurError::Resource { path, .. } if path == "model/mixture_weights"),
        "{err}"
    );
    assert_eq!(d.state(), DecoderState::NotInitialized);
}

#[tokio::test]
async fn engine_rejection_names_the_stage() {
    let loader = minimal_models().with("model/mdef", Vec::new());
    let mut d = decoder(loader);

    let err = d.initialize().await.unwrap_err();
    assert!(matches!(err, MurmurError::Pipeline { stage: Stage::Mdef, .. }), "{err}");
    assert!(!d.is_initialized());
}

#[tokio::test]
async fn feature_params_override_defaults() {
    let mut d = decoder(full_models());
    d.initialize().await.unwrap();

    assert_relative_eq!(d.config().get_float("lowerf").unwrap(), 130.0);
    assert_relative_eq!(d.config().get_float("upperf").unwrap(), 6800.0);
    let diag = d.diagnostics();
    assert_eq!(diag.params_applied, 2);
    assert_eq!(diag.params_ignored, 1);
}

#[tokio::test]
async fn malformed_feature_param_is_fatal() {
    let loader = minimal_models().with("model/feat_params.json", r#"{"-nfilt": "many"}"#);
    let mut d = decoder(loader);

    assert!(d.initialize().await.is_err());
    assert_eq!(d.state(), DecoderState::NotInitialized);
}

#[tokio::test]
async fn conflicting_grammar_sources_are_rejected() {
    let mut d = decoder(full_models());
    d.config_mut().set("jsgf", "grammar/nav.gram").unwrap();
    d.config_mut().set("fsg", "grammar/goforward.fsg").unwrap();

    let err = d.initialize().await.unwrap_err();
    assert!(matches!(err, MurmurError::ConflictingGrammars));
}

#[tokio::test]
async fn toprule_selects_the_rule() {
    let mut d = decoder(full_models());
    d.config_mut().set("jsgf", "grammar/nav.gram").unwrap();
    d.config_mut().set("toprule", "nav.turn").unwrap();
    d.initialize().await.unwrap();
    assert_eq!(d.grammar().unwrap().name(), "nav.turn");
}

#[tokio::test]
async fn failed_grammar_switch_keeps_the_old_grammar() {
    let mut d = ready_with_jsgf().await;

    let err = d.set_jsgf(NAV, Some("nope")).unwrap_err();
    assert!(matches!(err, MurmurError::RuleNotFound(_)));
    assert_eq!(d.grammar().unwrap().name(), "nav.move");

    let err = d
        .set_grammar("zoo", 0, 1, &[Transition::word(0, 1, "zebra", 1.0)])
        .unwrap_err();
    assert!(matches!(err, MurmurError::UnresolvedWord(w) if w == "zebra"));
    assert_eq!(d.grammar().unwrap().name(), "nav.move");

    d.set_fsg_text(GO_FORWARD).unwrap();
    assert_eq!(d.grammar().unwrap().name(), "goforward");
}

#[tokio::test]
async fn added_words_can_be_used_in_grammars() {
    let mut d = ready_with_jsgf().await;
    assert!(d.lookup_word("stop").unwrap().is_none());

    d.add_word("stop", "S T AA P").unwrap();
    assert_eq!(d.lookup_word("stop").unwrap().as_deref(), Some("S T AA P"));

    d.set_grammar(
        "halt",
        0,
        2,
        &[Transition::word(0, 1, "stop", 1.0), Transition::null(1, 2, 1.0)],
    )
    .unwrap();
    d.start().unwrap();
    d.process(Pcm::Float32(&vec![0.25; 1_600])).unwrap();
    d.stop().unwrap();
    assert_eq!(d.hypothesis().unwrap(), "stop");
}

#[tokio::test]
async fn reinitialized_frontend_uses_new_sample_rate() {
    let engine = StubEngine::new();
    let journal = engine.journal();
    let mut d = Decoder::new(engine, full_models());
    d.config_mut().set("hmm", "model").unwrap();
    d.config_mut().set("jsgf", "grammar/nav.gram").unwrap();
    d.initialize().await.unwrap();

    d.config_mut().set("samprate", 8000.0).unwrap();
    d.reinitialize_audio().await.unwrap();
    {
        let stages = journal.lock();
        assert_eq!(
            &stages[stages.len() - 3..],
            &[Stage::Frontend, Stage::Feature, Stage::Rewire]
        );
    }
    assert_eq!(d.grammar().unwrap().name(), "nav.move");

    d.start().unwrap();
    assert_eq!(d.process(Pcm::Int16(&one_second())).unwrap(), 200);
    d.stop().unwrap();
}

#[tokio::test]
async fn failed_audio_reinitialization_leaves_session_uninitialized() {
    let loader = full_models().with("model/empty_transform", Vec::new());
    let mut d = decoder(loader);
    d.config_mut().set("jsgf", "grammar/nav.gram").unwrap();
    d.initialize().await.unwrap();

    d.config_mut().set("lda", "model/empty_transform").unwrap();
    let err = d.reinitialize_audio().await.unwrap_err();
    assert!(matches!(err, MurmurError::Pipeline { stage: Stage::Feature, .. }), "{err}");
    assert_eq!(d.state(), DecoderState::NotInitialized);
    assert!(matches!(d.start(), Err(MurmurError::NotInitialized)));
    assert!(matches!(d.reinitialize_audio().await, Err(MurmurError::NotInitialized)));

    d.config_mut().unset("lda").unwrap();
    d.initialize().await.unwrap();
    assert_eq!(d.state(), DecoderState::Ready);
    assert!(stub_of(&d).has_transform());
}

#[tokio::test]
async fn reinitializing_with_a_new_rate_rescales_frames() {
    let engine = StubEngine::new();
    let journal = engine.journal();
    let mut d = Decoder::new(engine, full_models());
    d.config_mut().set("hmm", "model").unwrap();
    d.config_mut().set("jsgf", "grammar/nav.gram").unwrap();
    d.initialize().await.unwrap();

    d.config_mut().set("samprate", 8000).unwrap();
    d.initialize().await.unwrap();
    assert_eq!(journal.lock().len(), 20);
    assert_eq!(journal.lock()[10], Stage::Cleanup);

    d.start().unwrap();
    assert_eq!(d.process(Pcm::Int16(&one_second())).unwrap(), 200);
    d.stop().unwrap();
    assert_eq!(d.hypothesis().unwrap(), "go forward");
}

#[tokio::test]
async fn misaligned_bytes_are_rejected() {
    let mut d = ready_with_jsgf().await;
    d.start().unwrap();

    let err = d.process(Pcm::Bytes(&[0, 1, 2], SampleFormat::I16)).unwrap_err();
    assert!(matches!(err, MurmurError::UnalignedAudio { len: 3, width: 2 }));
    let err = d.process(Pcm::Bytes(&[0; 6], SampleFormat::F32)).unwrap_err();
    assert!(matches!(err, MurmurError::UnalignedAudio { len: 6, width: 4 }));

    let bytes: Vec<u8> = one_second().iter().flat_map(|s| s.to_le_bytes()).collect();
    assert_eq!(d.process(Pcm::Bytes(&bytes, SampleFormat::I16)).unwrap(), 100);
}

#[tokio::test]
async fn operations_respect_the_state_machine() {
    let mut d = decoder(full_models());
    assert!(matches!(d.start(), Err(MurmurError::NotInitialized)));
    assert!(matches!(d.hypothesis(), Err(MurmurError::NotInitialized)));

    d.config_mut().set("jsgf", "grammar/nav.gram").unwrap();
    d.initialize().await.unwrap();
    assert!(matches!(d.hypothesis(), Err(MurmurError::NoUtterance)));
    assert!(matches!(
        d.process(Pcm::Int16(&[0; 160])),
        Err(MurmurError::InvalidState { expected: DecoderState::InUtterance, .. })
    ));

    d.start().unwrap();
    assert!(matches!(d.start(), Err(MurmurError::InvalidState { .. })));
    assert!(matches!(d.initialize().await, Err(MurmurError::InvalidState { .. })));
    assert!(matches!(d.set_fsg_text(GO_FORWARD), Err(MurmurError::InvalidState { .. })));
    assert!(matches!(d.hypothesis(), Err(MurmurError::NoUtterance)));
    d.stop().unwrap();
    assert!(matches!(d.stop(), Err(MurmurError::InvalidState { .. })));

    d.hypothesis().unwrap();
    d.initialize().await.unwrap();
    assert!(matches!(d.hypothesis(), Err(MurmurError::NoUtterance)));
}

#[tokio::test]
async fn snapshot_restores_into_a_fresh_session() {
    let mut d = ready_with_jsgf().await;
    let json = d.config().to_json().unwrap();

    let config = Config::from_json(default_schema(), &json).unwrap();
    assert_eq!(config.snapshot(), d.config().snapshot());
    for (name, value) in d.config().snapshot() {
        assert_eq!(config.get(&name).unwrap(), Some(value));
    }

    let mut fresh = Decoder::new(StubEngine::new(), full_models());
    fresh.initialize_with(config).await.unwrap();
    assert_eq!(fresh.grammar().unwrap().name(), "nav.move");
    assert_relative_eq!(fresh.config().get_float("lowerf").unwrap(), 130.0);
}

#[tokio::test]
async fn shared_diagnostics_follow_the_session() {
    let mut d = decoder(full_models());
    assert!(d.log_math().is_none());
    d.config_mut().set("fsg", "grammar/goforward.fsg").unwrap();
    d.initialize().await.unwrap();

    let handle = d.diagnostics_handle();
    d.start().unwrap();
    d.process(Pcm::Int16(&one_second())).unwrap();
    d.stop().unwrap();
    assert_eq!(handle.snapshot(), d.diagnostics());
    assert_eq!(handle.snapshot().frames, 100);

    handle.reset();
    let diag = d.diagnostics();
    assert_eq!((diag.frames, diag.utterances, diag.stages_completed), (0, 0, 0));

    let text = fsg_text::write(d.grammar().unwrap(), d.log_math().unwrap());
    assert!(text.starts_with("FSG_BEGIN goforward"), "{text}");
    assert!(text.contains("TRANSITION 1 2"), "{text}");
}
