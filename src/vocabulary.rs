//! Built-in domain vocabularies.
//!
//! These tables are data: query expansion, sample inference and quality
//! scoring read them through their own configuration types, so a caller can
//! swap any of them without touching the algorithms.

pub type ConceptTable = &'static [(&'static str, &'static [&'static str])];

pub const CONDITION_SYNONYMS: ConceptTable = &[
    // abiotic stress
    (
        "salt_stress",
        &[
            "salt stress",
            "salt",
            "NaCl",
            "salinity",
            "sodium chloride",
            "saline",
            "ionic stress",
        ],
    ),
    (
        "drought",
        &[
            "drought",
            "water deficit",
            "water stress",
            "dehydration",
            "osmotic stress",
        ],
    ),
    (
        "cold",
        &[
            "cold stress",
            "cold",
            "low temperature",
            "chilling",
            "freezing",
            "frost",
        ],
    ),
    (
        "heat",
        &[
            "heat stress",
            "heat",
            "high temperature",
            "thermal stress",
            "elevated temperature",
        ],
    ),
    (
        "uv",
        &["UV", "UV-B", "UV-A", "ultraviolet", "UV radiation", "light stress"],
    ),
    (
        "oxidative",
        &[
            "oxidative stress",
            "H2O2",
            "hydrogen peroxide",
            "ROS",
            "reactive oxygen",
        ],
    ),
    (
        "heavy_metal",
        &[
            "heavy metal",
            "cadmium",
            "lead",
            "mercury",
            "aluminum",
            "metal toxicity",
        ],
    ),
    (
        "flooding",
        &["flooding", "waterlogging", "submergence", "hypoxia", "anoxia"],
    ),
    (
        "nutrient_deficiency",
        &[
            "nutrient deficiency",
            "nitrogen",
            "phosphorus",
            "potassium",
            "iron",
            "starvation",
        ],
    ),
    (
        "ph_stress",
        &["pH stress", "acidic", "alkaline", "low pH", "high pH"],
    ),
    // biotic stress
    (
        "pathogen",
        &[
            "pathogen",
            "infection",
            "disease",
            "bacterial",
            "fungal",
            "viral",
            "infected",
        ],
    ),
    (
        "herbivory",
        &["herbivory", "insect", "pest", "aphid", "caterpillar", "feeding"],
    ),
    (
        "elicitor",
        &["elicitor", "PAMP", "MAMP", "flagellin", "chitin", "immune"],
    ),
    // hormones
    ("auxin", &["auxin", "IAA", "indole acetic acid", "2,4-D"]),
    ("cytokinin", &["cytokinin", "CK", "6-BA", "kinetin"]),
    ("gibberellin", &["gibberellin", "GA", "GA3"]),
    ("abscisic_acid", &["abscisic acid", "ABA"]),
    ("ethylene", &["ethylene", "ACC", "ethylene treatment"]),
    (
        "jasmonic_acid",
        &["jasmonic acid", "JA", "jasmonate", "MeJA"],
    ),
    ("salicylic_acid", &["salicylic acid", "SA", "salicylate"]),
    ("brassinosteroid", &["brassinosteroid", "BR", "brassinolide"]),
    // development
    (
        "flowering",
        &["flowering", "floral", "flower development", "photoperiod"],
    ),
    (
        "germination",
        &["germination", "seed germination", "imbibition"],
    ),
    ("senescence", &["senescence", "aging", "leaf senescence"]),
    ("fruit_ripening", &["fruit ripening", "ripening", "maturation"]),
    (
        "root_development",
        &["root development", "lateral root", "root hair", "root growth"],
    ),
    // treatments
    (
        "chemical_treatment",
        &["chemical treatment", "compound", "inhibitor", "chemical"],
    ),
    (
        "light",
        &["light", "dark", "photoperiod", "shade", "blue light", "red light"],
    ),
    ("circadian", &["circadian", "diurnal", "clock", "rhythm"]),
];

pub const EXPERIMENT_SYNONYMS: ConceptTable = &[
    // transcriptomics
    (
        "rna_seq",
        &[
            "RNA-seq",
            "RNAseq",
            "RNA seq",
            "transcriptome",
            "transcriptomic",
            "transcriptomics",
        ],
    ),
    (
        "single_cell_rna",
        &[
            "single-cell",
            "scRNA-seq",
            "single cell RNA-seq",
            "droplet-based",
            "10x Genomics",
        ],
    ),
    (
        "microarray",
        &[
            "microarray",
            "gene chip",
            "expression array",
            "Affymetrix",
            "Agilent",
        ],
    ),
    (
        "small_rna",
        &["small RNA", "miRNA", "sRNA", "microRNA", "siRNA"],
    ),
    // genomics
    (
        "wgs",
        &[
            "whole genome sequencing",
            "WGS",
            "genome sequencing",
            "complete genome",
            "de novo",
        ],
    ),
    (
        "resequencing",
        &["resequencing", "variant calling", "SNP", "mutation", "GWAS"],
    ),
    (
        "targeted_sequencing",
        &["targeted sequencing", "amplicon", "panel sequencing", "targeted"],
    ),
    (
        "ddrad",
        &["ddRAD", "RAD-seq", "GBS", "genotyping by sequencing"],
    ),
    // epigenomics
    (
        "chip_seq",
        &[
            "ChIP-seq",
            "ChIPseq",
            "ChIP seq",
            "chromatin immunoprecipitation",
        ],
    ),
    (
        "atac_seq",
        &["ATAC-seq", "ATACseq", "ATAC seq", "chromatin accessibility"],
    ),
    (
        "bisulfite_seq",
        &[
            "bisulfite",
            "WGBS",
            "methylation",
            "BS-seq",
            "methylome",
            "DNA methylation",
        ],
    ),
    (
        "dnase_seq",
        &["DNase-seq", "DNase hypersensitivity", "DHS"],
    ),
    (
        "mnase_seq",
        &["MNase-seq", "nucleosome", "nucleosome positioning"],
    ),
    // proteomics
    (
        "proteomics",
        &[
            "proteomics",
            "mass spectrometry",
            "LC-MS",
            "protein",
            "peptide",
            "iTRAQ",
            "TMT",
        ],
    ),
    (
        "phosphoproteomics",
        &["phosphoproteomics", "phosphorylation", "PTM"],
    ),
    // other
    (
        "hi_c",
        &[
            "Hi-C",
            "chromatin conformation",
            "3C",
            "chromosome conformation",
            "3D genome",
        ],
    ),
    (
        "clip_seq",
        &["CLIP-seq", "CLIP", "RNA-protein interaction", "RIP"],
    ),
    (
        "ribosome_profiling",
        &["ribosome profiling", "Ribo-seq", "translation"],
    ),
    ("degradome", &["degradome", "PARE", "degradome-seq"]),
    ("chia_pet", &["ChIA-PET", "chromatin interaction"]),
];

/// Concept keys whose experiments sequence RNA.
pub const RNA_EXPERIMENT_CONCEPTS: &[&str] = &["rna_seq", "single_cell_rna", "small_rna"];

/// Plant sample/tissue vocabulary in match-priority order.
///
/// Short acronyms and words that commonly occur inside unrelated words
/// ("SAM" in "sample", "style" in "lifestyle") are left out because the
/// inferencer matches substrings.
pub const PLANT_SAMPLE_KEYWORDS: &[&str] = &[
    // roots
    "root",
    "lateral root",
    "primary root",
    "adventitious root",
    "root hair",
    "root cap",
    "radicle",
    // shoots
    "shoot",
    "stem",
    "hypocotyl",
    "epicotyl",
    "internode",
    // leaves
    "leaf",
    "leaves",
    "cotyledon",
    "rosette",
    // apical structures
    "shoot apical meristem",
    "root apical meristem",
    "meristem",
    "cambium",
    // flowers
    "flower",
    "floral",
    "inflorescence",
    "petal",
    "sepal",
    "stamen",
    "carpel",
    "pistil",
    "anther",
    "stigma",
    "ovary",
    // seeds and fruits
    "seedling",
    "seed",
    "fruit",
    "berry",
    "silique",
    "grain",
    "kernel",
    "embryo",
    "endosperm",
    "pericarp",
    "testa",
    // pollen
    "pollen",
    "microspore",
    // tissues
    "epidermis",
    "cortex",
    "endodermis",
    "pericycle",
    "stele",
    "xylem",
    "phloem",
    "vascular tissue",
    "parenchyma",
    "mesophyll",
    "palisade",
    "guard cell",
    "stomata",
    // cell types
    "protoplast",
    "cell culture",
    "suspension culture",
    "callus",
    "trichome",
    // developmental stages
    "mature plant",
    "whole plant",
    "aerial tissue",
    // specialized structures
    "tuber",
    "bulb",
    "rhizome",
    "stolon",
    "corm",
    "nodule",
    // general
    "mixed tissue",
    "pooled",
];

/// Sample vocabulary for organisms not recognised as plants.
pub const GENERAL_SAMPLE_KEYWORDS: &[&str] = &[
    "whole blood",
    "blood",
    "plasma",
    "serum",
    "liver",
    "brain",
    "cortex",
    "hippocampus",
    "heart",
    "kidney",
    "lung",
    "spleen",
    "muscle",
    "skin",
    "intestine",
    "colon",
    "stomach",
    "pancreas",
    "adipose",
    "bone marrow",
    "lymph node",
    "thymus",
    "testis",
    "ovary",
    "embryo",
    "larva",
    "tumor",
    "biopsy",
    "cell line",
    "cell culture",
    "organoid",
    "whole body",
    "whole organism",
    "biofilm",
    "culture",
];

pub const MODEL_PLANT_ORGANISMS: &[&str] = &[
    "Arabidopsis thaliana",
    "Oryza sativa",
    "Zea mays",
    "Medicago truncatula",
    "Brachypodium distachyon",
    "Triticum aestivum",
    "Hordeum vulgare",
    "Sorghum bicolor",
    "Setaria italica",
    "Avena sativa",
    "Glycine max",
    "Phaseolus vulgaris",
    "Pisum sativum",
    "Cicer arietinum",
    "Lens culinaris",
    "Solanum lycopersicum",
    "Solanum tuberosum",
    "Capsicum annuum",
    "Nicotiana tabacum",
    "Nicotiana benthamiana",
    "Brassica napus",
    "Brassica oleracea",
    "Brassica rapa",
    "Vitis vinifera",
    "Malus domestica",
    "Prunus persica",
    "Fragaria vesca",
    "Citrus sinensis",
    "Musa acuminata",
    "Populus trichocarpa",
    "Eucalyptus grandis",
    "Pinus taeda",
    "Cucumis sativus",
    "Cucurbita pepo",
    "Lactuca sativa",
    "Spinacia oleracea",
    "Daucus carota",
    "Saccharum officinarum",
    "Panicum virgatum",
    "Gossypium hirsutum",
    "Cannabis sativa",
    "Chlamydomonas reinhardtii",
];

pub const PLANT_GENUS_INDICATORS: &[&str] = &[
    "arabidopsis",
    "oryza",
    "zea",
    "medicago",
    "brachypodium",
    "triticum",
    "hordeum",
    "sorghum",
    "glycine",
    "phaseolus",
    "solanum",
    "capsicum",
    "nicotiana",
    "brassica",
    "vitis",
    "malus",
    "prunus",
    "fragaria",
    "citrus",
    "musa",
    "populus",
    "eucalyptus",
    "pinus",
    "gossypium",
    "saccharum",
    "panicum",
    "cannabis",
    "cucumis",
    "cucurbita",
    "lactuca",
    "spinacia",
    "daucus",
    "chlamydomonas",
];

/// Common names that stand in for a species in registry metadata.
pub const COMMON_NAME_ALIASES: &[&str] = &[
    "thale cress",
    "mouse-ear cress",
    "rice",
    "maize",
    "corn",
    "wheat",
    "barley",
    "soybean",
    "tomato",
    "potato",
    "tobacco",
    "grape",
    "apple",
    "poplar",
    "cotton",
    "human",
    "mouse",
    "rat",
    "zebrafish",
    "fruit fly",
    "yeast",
    "baker's yeast",
];

pub const BIOLOGICAL_KEYWORDS: &[&str] = &[
    // general
    "response",
    "expression",
    "analysis",
    "study",
    "effect",
    "regulation",
    "function",
    "mechanism",
    "pathway",
    "role",
    "identification",
    "characterization",
    "profiling",
    // development and morphology
    "development",
    "morphology",
    "growth",
    "differentiation",
    "flowering",
    "germination",
    "senescence",
    "ripening",
    // stress responses
    "stress",
    "tolerance",
    "resistance",
    "adaptation",
    "abiotic",
    "biotic",
    "defense",
    "immunity",
    // structures
    "tissue",
    "organ",
    "root",
    "leaf",
    "shoot",
    "stem",
    "flower",
    "seed",
    "fruit",
    "meristem",
    // molecular processes
    "transcriptome",
    "genome",
    "proteome",
    "metabolome",
    "gene expression",
    "transcript",
    "protein",
    "metabolite",
    "epigenetic",
    "chromatin",
    "methylation",
    // physiology
    "photosynthesis",
    "respiration",
    "transpiration",
    "nutrient",
    "hormone",
    "signaling",
    "transport",
];

pub const METHOD_KEYWORDS: &[&str] = &[
    // transcriptomics
    "RNA",
    "sequencing",
    "library",
    "reads",
    "cDNA",
    "RNA-seq",
    "single-cell",
    "scRNA",
    "droplet",
    "10x",
    "cell type",
    "microarray",
    "hybridization",
    "probe",
    "Affymetrix",
    "Agilent",
    "small RNA",
    "miRNA",
    "microRNA",
    "siRNA",
    // genomics
    "genome",
    "variant",
    "SNP",
    "mutation",
    "coverage",
    "assembly",
    "resequencing",
    "variant calling",
    "genotype",
    "polymorphism",
    "amplicon",
    "targeted",
    "panel",
    "capture",
    "RAD-seq",
    "GBS",
    "restriction site",
    // epigenomics
    "ChIP",
    "binding",
    "peak",
    "chromatin",
    "histone",
    "antibody",
    "ATAC",
    "accessibility",
    "open chromatin",
    "transposase",
    "bisulfite",
    "methylation",
    "WGBS",
    "CpG",
    "5mC",
    "DNase",
    "hypersensitivity",
    "MNase",
    "nucleosome",
    // proteomics
    "protein",
    "peptide",
    "mass spec",
    "LC-MS",
    "tandem mass",
    "proteome",
    "phosphorylation",
    "phosphopeptide",
    "kinase",
    // other methods
    "Hi-C",
    "chromosome conformation",
    "contact map",
    "CLIP",
    "RNA-binding protein",
    "crosslinking",
    "ribosome profiling",
    "Ribo-seq",
    "footprint",
    "degradome",
    "cleavage site",
    // experimental design
    "sample",
    "replicate",
    "condition",
    "treatment",
    "control",
    "biological replicate",
    "technical replicate",
    "time course",
    "dose response",
];

pub fn owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|word| word.to_string()).collect()
}

/// Whether an organism string names a plant the vocabularies know about.
pub fn is_plant_organism(organism: &str) -> bool {
    let lower = organism.to_lowercase();
    MODEL_PLANT_ORGANISMS
        .iter()
        .any(|plant| lower.contains(&plant.to_lowercase()))
        || lower
            .split_whitespace()
            .next()
            .map(|genus| PLANT_GENUS_INDICATORS.contains(&genus))
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plant_detection() {
        assert!(is_plant_organism("Arabidopsis thaliana"));
        assert!(is_plant_organism("Oryza sativa Japonica Group"));
        assert!(is_plant_organism("Solanum pennellii"));
        assert!(!is_plant_organism("Homo sapiens"));
        assert!(!is_plant_organism(""));
    }

    #[test]
    fn concept_keys_are_unique() {
        for table in [CONDITION_SYNONYMS, EXPERIMENT_SYNONYMS] {
            let mut keys = table.iter().map(|(key, _)| *key).collect::<Vec<_>>();
            let before = keys.len();
            keys.sort_unstable();
            keys.dedup();
            assert_eq!(keys.len(), before);
        }
    }
}
