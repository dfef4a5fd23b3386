//! Display vocabulary for detector class names.
//!
//! Detectors speak the canonical (English, COCO) class names. The overlay shows
//! whatever vocabulary the session selected. Lookup is case-insensitive and total:
//! a name missing from the table is shown as the detector reported it.

/// Canonical COCO class name -> Portuguese display name.
const PORTUGUESE: &[(&str, &str)] = &[
    ("person", "pessoa"),
    ("bicycle", "bicicleta"),
    ("car", "carro"),
    ("motorcycle", "moto"),
    ("airplane", "avião"),
    ("bus", "ônibus"),
    ("train", "trem"),
    ("truck", "caminhão"),
    ("boat", "barco"),
    ("traffic light", "semáforo"),
    ("fire hydrant", "hidrante"),
    ("stop sign", "placa de pare"),
    ("parking meter", "parquímetro"),
    ("bench", "banco"),
    ("bird", "pássaro"),
    ("cat", "gato"),
    ("dog", "cachorro"),
    ("horse", "cavalo"),
    ("sheep", "ovelha"),
    ("cow", "vaca"),
    ("elephant", "elefante"),
    ("bear", "urso"),
    ("zebra", "zebra"),
    ("giraffe", "girafa"),
    ("backpack", "mochila"),
    ("umbrella", "guarda-chuva"),
    ("handbag", "bolsa"),
    ("tie", "gravata"),
    ("suitcase", "mala"),
    ("bottle", "garrafa"),
    ("wine glass", "taça de vinho"),
    ("cup", "xícara"),
    ("fork", "garfo"),
    ("knife", "faca"),
    ("spoon", "colher"),
    ("bowl", "tigela"),
    ("banana", "banana"),
    ("apple", "maçã"),
    ("sandwich", "sanduíche"),
    ("orange", "laranja"),
    ("broccoli", "brócolis"),
    ("carrot", "cenoura"),
    ("hot dog", "cachorro-quente"),
    ("pizza", "pizza"),
    ("donut", "rosquinha"),
    ("cake", "bolo"),
    ("chair", "cadeira"),
    ("couch", "sofá"),
    ("potted plant", "planta"),
    ("bed", "cama"),
    ("dining table", "mesa de jantar"),
    ("toilet", "vaso sanitário"),
    ("tv", "televisão"),
    ("laptop", "laptop"),
    ("mouse", "mouse"),
    ("remote", "controle remoto"),
    ("keyboard", "teclado"),
    ("cell phone", "celular"),
    ("microwave", "micro-ondas"),
    ("oven", "forno"),
    ("toaster", "torradeira"),
    ("sink", "pia"),
    ("refrigerator", "geladeira"),
    ("book", "livro"),
    ("clock", "relógio"),
    ("vase", "vaso"),
    ("scissors", "tesoura"),
    ("teddy bear", "ursinho de pelúcia"),
    ("hair drier", "secador de cabelo"),
    ("toothbrush", "escova de dentes"),
];

/// Display vocabulary selector (config `overlay.vocabulary`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Vocabulary {
    #[default]
    Portuguese,
    Canonical,
}

impl Vocabulary {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "pt" | "pt-br" | "portuguese" => Some(Self::Portuguese),
            "canonical" | "en" | "none" => Some(Self::Canonical),
            _ => None,
        }
    }
}

/// Stateless label lookup over a static table.
#[derive(Clone, Copy, Debug)]
pub struct LabelTranslator {
    table: &'static [(&'static str, &'static str)],
}

impl LabelTranslator {
    pub fn portuguese() -> Self {
        Self { table: PORTUGUESE }
    }

    /// Identity translator: every label is shown as reported.
    pub fn canonical() -> Self {
        Self { table: &[] }
    }

    pub fn for_vocabulary(vocabulary: Vocabulary) -> Self {
        match vocabulary {
            Vocabulary::Portuguese => Self::portuguese(),
            Vocabulary::Canonical => Self::canonical(),
        }
    }

    /// Map a canonical class name to its display name.
    ///
    /// The lookup key is lowercased; a miss returns `canonical_label` untouched,
    /// original casing included.
    pub fn translate(&self, canonical_label: &str) -> String {
        let key = canonical_label.to_lowercase();
        self.table
            .iter()
            .find(|(canonical, _)| *canonical == key)
            .map(|(_, display)| (*display).to_string())
            .unwrap_or_else(|| canonical_label.to_string())
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl Default for LabelTranslator {
    fn default() -> Self {
        Self::portuguese()
    }
}
